//! Field names of the `snakes` index.

/// Binomial or trinomial name.
pub const SCIENTIFIC_NAME: &str = "scientific_name";
/// Vietnamese common name.
pub const VIETNAMESE_NAME: &str = "vietnamese_name";
/// Other common names, mostly English.
pub const COMMON_NAMES: &str = "common_names";
/// Taxonomic family.
pub const FAMILY: &str = "family";
/// Free-text danger description.
pub const DANGER_LEVEL: &str = "danger_level";
/// Normalized danger keyword: `venomous` or `non_venomous`.
pub const DANGER_CLASS: &str = "danger_class";
/// Countries and regions the species occurs in.
pub const DISTRIBUTION: &str = "distribution";
/// Appearance and biology description.
pub const BIOLOGY: &str = "biology";
/// Venom description.
pub const VENOM: &str = "venom";
/// Maximum recorded length in centimetres.
pub const MAX_LENGTH_CM: &str = "max_len_cm";
/// Concatenated description the embedding was computed from.
pub const FULL_TEXT_CONTEXT: &str = "full_text_context";
/// Dense vector field.
pub const VECTOR_EMBEDDING: &str = "vector_embedding";
