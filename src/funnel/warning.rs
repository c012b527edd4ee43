use serde::Serialize;
use thiserror::Error;

/// Non-fatal conditions found while deriving a funnel. The affected values are
/// reported as undefined rather than Infinity/NaN.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FunnelWarning {
    #[error("stage '{stage}' (order {order}) has a zero pass-through rate; required candidates are undefined")]
    ZeroPassThroughRate { order: u32, stage: String },
    #[error("stage '{stage}' (order {order}) has a non-finite pass-through rate; treated as 0")]
    NonFinitePassThroughRate { order: u32, stage: String },
    #[error("stage '{stage}' (order {order}) overflowed the representable range; its value is undefined")]
    ValueOverflow { order: u32, stage: String },
    #[error("the grand sum overflowed the representable range; it is undefined")]
    GrandSumOverflow,
}

impl FunnelWarning {
    /// Stage order the warning refers to; `None` for funnel-wide warnings.
    pub fn order(&self) -> Option<u32> {
        match self {
            Self::ZeroPassThroughRate { order, .. }
            | Self::NonFinitePassThroughRate { order, .. }
            | Self::ValueOverflow { order, .. } => Some(*order),
            Self::GrandSumOverflow => None,
        }
    }
}
