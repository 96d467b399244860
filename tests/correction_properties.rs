use immoprix::correction::{CorrectionInput, PriceCorrector};
use immoprix::dataset::{correct_postal_code, PropertyType};
use immoprix::trainer::{bias_factor, BIAS_BOUNDS};
use proptest::prelude::*;

fn property_type() -> impl Strategy<Value = PropertyType> {
    prop::sample::select(PropertyType::ALL.to_vec())
}

fn code() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "75001", "75016", "75020", "75", "92100", "93", "69003", "13008", "06000", "23000", "2A",
    ])
    .prop_map(str::to_string)
}

proptest! {
    #[test]
    fn presentation_price_stays_within_clamp(
        raw in -1.0e7..1.0e8f64,
        surface in 1.0..1000.0f64,
        plot in 0.0..5000.0f64,
        kind in property_type(),
        code in code(),
    ) {
        let corrector = PriceCorrector::presentation();
        let c = corrector.correct(&CorrectionInput {
            raw_price: raw,
            surface,
            code: &code,
            property_type: kind,
            plot,
        });
        if raw > 0.0 {
            let mut upper = 1.8 * c.base_price;
            if kind == PropertyType::House {
                upper *= 1.1;
            }
            prop_assert!(c.price >= 0.4 * c.base_price * (1.0 - 1e-12));
            prop_assert!(c.price <= upper * (1.0 + 1e-12));
        } else {
            prop_assert_eq!(c.price, c.reference_price);
        }
    }

    #[test]
    fn presentation_reference_weight_grows_with_disagreement(
        low in 0.7..=1.3f64,
        mid in 1.31..=1.8f64,
        high in 1.81..100.0f64,
    ) {
        let blend = PriceCorrector::presentation().blend;
        let (w_low, w_mid, w_high) =
            (blend.model_weight(low), blend.model_weight(mid), blend.model_weight(high));
        prop_assert!(1.0 - w_low < 1.0 - w_mid);
        prop_assert!(1.0 - w_mid < 1.0 - w_high);
    }

    #[test]
    fn inference_keeps_plausible_prices(
        ratio in 0.51..1.99f64,
        surface in 10.0..500.0f64,
        code in code(),
    ) {
        let corrector = PriceCorrector::inference();
        let reference = corrector.correct(&CorrectionInput {
            raw_price: 1.0,
            surface,
            code: &code,
            property_type: PropertyType::Apartment,
            plot: 0.0,
        }).reference_price;
        let raw = reference * ratio;
        let price = corrector.correct_price(raw, surface, &code, PropertyType::Apartment, 0.0);
        prop_assert!((price - raw).abs() <= 1e-9 * raw);
    }

    #[test]
    fn bias_factor_is_bounded(
        actual in prop::collection::vec(-1.0e6..1.0e7f64, 0..20),
        predicted in prop::collection::vec(-1.0e6..1.0e7f64, 0..20),
    ) {
        let factor = bias_factor(&actual, &predicted);
        prop_assert!((BIAS_BOUNDS.0..=BIAS_BOUNDS.1).contains(&factor));
    }

    #[test]
    fn postal_codes_with_four_digits_are_repaired(token in "[0-9 .-]{0,3}[0-9]{4,8}[0-9a-z.]{0,3}") {
        let code = correct_postal_code(&token).unwrap();
        prop_assert_eq!(code.len(), 5);
        prop_assert!(code.bytes().all(|b| b.is_ascii_digit()));
    }

    #[test]
    fn postal_codes_with_few_digits_are_rejected(token in "[a-z .]{0,4}[0-9]{0,3}[a-z]{0,2}") {
        prop_assert_eq!(correct_postal_code(&token), None);
    }
}
