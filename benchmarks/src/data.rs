use immoprix::dataset::{PropertyType, TransactionRecord};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generates sales whose price per m² depends on the postal code and type.
#[derive(Clone, Debug)]
pub struct SyntheticMarket {
    markets: Vec<(String, f64)>,
    noise: f64,
    seed: u64,
}

impl Default for SyntheticMarket {
    fn default() -> Self {
        let markets = [
            ("75011", 9500.0),
            ("92100", 6400.0),
            ("69003", 4300.0),
            ("13008", 3600.0),
            ("33000", 3900.0),
            ("59000", 3100.0),
            ("23000", 1600.0),
        ];
        Self {
            markets: markets
                .iter()
                .map(|&(code, rate)| (code.to_string(), rate))
                .collect(),
            noise: 0.15,
            seed: 42,
        }
    }
}

impl SyntheticMarket {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }

    pub fn records(&self, n: usize) -> Vec<TransactionRecord> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        (0..n)
            .map(|_| {
                let (code, rate) = &self.markets[rng.gen_range(0..self.markets.len())];
                let house = rng.gen_bool(0.35);
                let surface: f64 = if house {
                    rng.gen_range(60.0..220.0)
                } else {
                    rng.gen_range(15.0..140.0)
                };
                let noise = 1.0 + rng.gen_range(-self.noise..=self.noise);
                TransactionRecord {
                    price: (surface * rate * if house { 1.05 } else { 1.0 } * noise).round(),
                    surface: surface.round(),
                    rooms: ((surface / 22.0).round() as u32).clamp(1, 10),
                    plot: house.then(|| rng.gen_range(100.0..1500.0_f64).round()),
                    property_type: Some(if house {
                        PropertyType::House
                    } else {
                        PropertyType::Apartment
                    }),
                    postal_code: Some(code.clone()),
                    sale_date: None,
                }
            })
            .collect()
    }
}
