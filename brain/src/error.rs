use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Cost-model and strategy-selection failures.
#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// The cost model needs a concrete geometry to price.
    #[snafu(display("performance estimate requested before a geometry was chosen"))]
    MissingGeometry,

    /// The cost model needs a concrete walking pattern to price.
    #[snafu(display("performance estimate requested before a walking pattern was chosen"))]
    MissingPattern,

    /// No candidate geometry survived the chip's selection rules.
    #[snafu(display("no candidate geometry for this operation"))]
    NoCandidateGeometry,
}
