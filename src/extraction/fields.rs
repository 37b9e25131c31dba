/// Header of the first export column, holding the uploaded file name
pub const SOURCE_FILE_COLUMN: &str = "Source File";

/// The fields read from every memo, in export column order
pub const FIELDS: [&str; 21] = [
    "Memo date",
    "Relationship",
    "Group",
    "Main Borrower",
    "Co-Utilizer",
    "CRG",
    "E&S Risk",
    "CIB Status",
    "External Rating",
    "Strategy",
    "Segment",
    "Lending Rate",
    "Exposure Type",
    "Branch",
    "Key Person",
    "Enhancement History",
    "RM",
    "UH",
    "Risk Manager",
    "AH",
    "Risk UH",
];

/// Owned copy of [`FIELDS`], the default field list of a run
pub fn default_fields() -> Vec<String> {
    FIELDS.iter().map(|field| field.to_string()).collect()
}
