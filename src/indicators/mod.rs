// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators feeding the
// classifier features.  Every function returns a series exactly as long as
// its input, with `f64::NAN` in positions that lack enough history, so the
// feature frame can drop incomplete rows uniformly.

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod momentum;
pub mod obv;
pub mod rsi;
pub mod sma;
pub mod stoch_rsi;
