use super::{CustomerRecord, DetailField, field, format};

/// Columns that every result table shows, in display order.
pub const MANDATORY_COLUMNS: &[(&str, &str)] = &[
    ("ID", field::CUSTOMER_ID),
    ("Age", field::AGE),
    ("Gender", field::GENDER),
    ("Country", field::COUNTRY),
    ("Registered", field::REGISTRATION_DATE),
];

/// Optional table columns. Which of them appear depends on the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Premium,
    RiskProfile,
    Coverage,
    CarBrand,
    Similarity,
    Segment,
}

impl Column {
    pub const ALL: [Column; 6] = [
        Column::Premium,
        Column::RiskProfile,
        Column::Coverage,
        Column::CarBrand,
        Column::Similarity,
        Column::Segment,
    ];

    pub fn field(self) -> &'static str {
        match self {
            Column::Premium => field::PREMIUM_AMOUNT,
            Column::RiskProfile => field::RISK_PROFILE,
            Column::Coverage => field::COVERAGE_LEVEL,
            Column::CarBrand => field::CAR_BRAND,
            Column::Similarity => field::SIMILARITY_SCORE,
            Column::Segment => field::CLUSTER_NAME,
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            Column::Premium => "Premium",
            Column::RiskProfile => "Risk Profile",
            Column::Coverage => "Coverage",
            Column::CarBrand => "Car Brand",
            Column::Similarity => "Similarity",
            Column::Segment => "Segment",
        }
    }

    pub fn cell(self, record: &CustomerRecord) -> String {
        let key = self.field();
        match self {
            Column::Premium => record.number(key).map(format::money),
            Column::Similarity => record.number(key).map(format::similarity),
            _ => record.text(key),
        }
        .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShapeKind {
    #[default]
    Empty,
    Browse,
    Search,
    Cluster,
}

impl ShapeKind {
    /// How the rows are ordered or grouped, for result headers.
    pub fn ordering(self) -> Option<&'static str> {
        match self {
            ShapeKind::Search => Some("ranked by similarity"),
            ShapeKind::Cluster => Some("grouped by segment"),
            ShapeKind::Browse | ShapeKind::Empty => None,
        }
    }
}

/// The set of optional columns and detail fields a result set carries.
///
/// Computed once per fetch from the first record; later records never widen
/// or narrow it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultShape {
    kind: ShapeKind,
    columns: Vec<Column>,
    details: Vec<DetailField>,
}

impl ResultShape {
    pub fn resolve(records: &[CustomerRecord]) -> Self {
        let Some(first) = records.first() else {
            return Self::default();
        };
        let kind = if first.has(field::SIMILARITY_SCORE) {
            ShapeKind::Search
        } else if first.has(field::CLUSTER_NAME) {
            ShapeKind::Cluster
        } else {
            ShapeKind::Browse
        };
        let columns = Column::ALL
            .into_iter()
            .filter(|column| first.has(column.field()))
            .collect();
        let details = DetailField::ALL
            .into_iter()
            .filter(|detail| first.has(detail.field()))
            .collect();
        Self {
            kind,
            columns,
            details,
        }
    }

    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    pub fn is_empty(&self) -> bool {
        self.kind == ShapeKind::Empty
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn details(&self) -> &[DetailField] {
        &self.details
    }

    pub fn has_column(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    /// Header labels, mandatory columns first. Empty for an empty result set.
    pub fn headers(&self) -> Vec<&'static str> {
        if self.is_empty() {
            return Vec::new();
        }
        MANDATORY_COLUMNS
            .iter()
            .map(|(header, _)| *header)
            .chain(self.columns.iter().map(|column| column.header()))
            .collect()
    }

    pub fn row(&self, record: &CustomerRecord) -> Vec<String> {
        let mandatory = MANDATORY_COLUMNS.iter().map(|(_, key)| {
            if *key == field::REGISTRATION_DATE {
                record
                    .text(key)
                    .and_then(|raw| format::date(&raw))
                    .unwrap_or_default()
            } else {
                record.text(key).unwrap_or_default()
            }
        });
        mandatory
            .chain(self.columns.iter().map(|column| column.cell(record)))
            .collect()
    }
}
