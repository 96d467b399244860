/// A marker type indicating that a model is **not yet trained**.
///
/// Used as the state parameter of models (e.g. `RidgeRegression<Unfitted>`)
/// so that only unfitted models can be trained and only fitted ones predict.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unfitted;

/// A marker type indicating that a model has been **fully trained**.
///
/// A fitted model holds only what inference needs and can be serialized
/// through its parameters.
#[derive(Clone, Copy, Debug, Default)]
pub struct Fitted;
