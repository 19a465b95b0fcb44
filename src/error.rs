//! Error types for scale resolution and geometry layout.

use crate::data::ColumnKind;
use crate::geom::PositionKind;
use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while resolving scales or computing draw positions.
///
/// All of these describe caller misuse (a bad column choice or a malformed
/// scale request), so none are retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The column backing a scale has no values.
    #[error("scale `{scale}`: column is empty, cannot determine discreteness")]
    EmptyColumn { scale: String },

    /// An object column contains nested object values.
    #[error("scale `{scale}`: object columns with nested values are not supported")]
    UnsupportedObjectColumn { scale: String },

    /// A column of an opaque type the classifier cannot inspect.
    #[error("scale `{scale}`: generic column of type `{type_name}` is not supported")]
    GenericColumnUnsupported { scale: String, type_name: String },

    /// A continuous size/alpha/color domain with `low == high`.
    #[error("scale `{scale}`: degenerate range [{low}, {high}]")]
    DegenerateRange { scale: String, low: f64, high: f64 },

    /// Forward transform given without its inverse or vice versa.
    #[error("scale `{scale}`: transformed scales need both a transform and its inverse")]
    MissingTransformPair { scale: String },

    /// Wrong column type for a `Setting` color/size/alpha channel.
    #[error("scale `{scale}`: column of kind {kind:?} cannot be used here")]
    InvalidColumnType { scale: String, kind: ColumnKind },

    /// E.g. a continuous shape scale.
    #[error("scale `{scale}`: {reason}")]
    UnsupportedChannelCombination { scale: String, reason: String },

    /// Dodge and fill positions are not implemented.
    #[error("position `{0:?}` is not implemented yet")]
    UnimplementedPositionPolicy(PositionKind),

    /// A transform maps the domain ends to non finite values.
    #[error("scale `{scale}`: transform is undefined on domain [{low}, {high}]")]
    InvalidTransformDomain { scale: String, low: f64, high: f64 },

    /// Referenced column does not exist in the data frame.
    #[error("column `{0}` not found")]
    UnknownColumn(String),

    /// Column lengths disagree when assembling a data frame.
    #[error("column `{name}` has {got} rows, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    /// A string could not be parsed as a color literal.
    #[error("invalid color `{0}`")]
    InvalidColor(String),

    /// Bin width of the last row requested without a closing edge row.
    #[error("cannot infer bin width of row {row} of `{col}`: no following edge row")]
    MissingBinEdge { col: String, row: usize },

    /// A geom needs a channel its layer never mapped.
    #[error("layer {layer}: geom needs the `{aesthetic}` aesthetic")]
    MissingAesthetic { aesthetic: String, layer: u16 },

    /// A discrete value missing from a scale's label set.
    #[error("scale `{scale}`: value `{value}` is not one of its labels")]
    UnknownLabel { scale: String, value: String },
}
