use jigsaw_core::PieceKind;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    /// Two pieces (or a piece and a feature) of incompatible kinds were compared.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    /// The generic strategy contract was invoked without a concrete implementation.
    #[error("strategy `{strategy}` does not implement {operation}")]
    Unimplemented {
        strategy: &'static str,
        operation: &'static str,
    },
    #[error("piece shape is degenerate (zero area or too few contour points)")]
    DegenerateShape,
}

pub(crate) fn kind_name(kind: PieceKind) -> &'static str {
    match kind {
        PieceKind::Template => "template",
        PieceKind::Regular => "regular",
    }
}

/// Fails with [`MatchError::TypeMismatch`] unless both kinds agree.
pub(crate) fn ensure_same_kind(a: PieceKind, b: PieceKind) -> Result<(), MatchError> {
    if a == b {
        Ok(())
    } else {
        Err(MatchError::TypeMismatch {
            expected: kind_name(a),
            found: kind_name(b),
        })
    }
}
