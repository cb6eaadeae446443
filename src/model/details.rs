use super::{CustomerRecord, ResultShape, field, format};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Policy,
    Risk,
    Vehicle,
    Description,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::Policy,
        Section::Risk,
        Section::Vehicle,
        Section::Description,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Section::Policy => "Policy Details",
            Section::Risk => "Risk Factors",
            Section::Vehicle => "Vehicle Details",
            Section::Description => "Customer Description",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Text,
    Money,
    Date,
    YesNo,
}

/// A field shown in the expandable detail panel of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetailField {
    PolicyId,
    StartDate,
    Premium,
    PaymentFrequency,
    CoverageLevel,
    Deductible,
    SecondDriver,
    RiskProfile,
    Accidents,
    YearsLicensed,
    Garage,
    CarBrand,
    CarModel,
    CarYear,
    Description,
}

impl DetailField {
    pub const ALL: [DetailField; 15] = [
        DetailField::PolicyId,
        DetailField::StartDate,
        DetailField::Premium,
        DetailField::PaymentFrequency,
        DetailField::CoverageLevel,
        DetailField::Deductible,
        DetailField::SecondDriver,
        DetailField::RiskProfile,
        DetailField::Accidents,
        DetailField::YearsLicensed,
        DetailField::Garage,
        DetailField::CarBrand,
        DetailField::CarModel,
        DetailField::CarYear,
        DetailField::Description,
    ];

    pub fn field(self) -> &'static str {
        match self {
            DetailField::PolicyId => field::POLICY_ID,
            DetailField::StartDate => field::START_DATE,
            DetailField::Premium => field::PREMIUM_AMOUNT,
            DetailField::PaymentFrequency => field::PAYMENT_FREQUENCY,
            DetailField::CoverageLevel => field::COVERAGE_LEVEL,
            DetailField::Deductible => field::DEDUCTIBLE,
            DetailField::SecondDriver => field::HAS_SECOND_DRIVER,
            DetailField::RiskProfile => field::RISK_PROFILE,
            DetailField::Accidents => field::NUM_ACCIDENTS,
            DetailField::YearsLicensed => field::YEARS_WITH_LICENSE,
            DetailField::Garage => field::HAS_GARAGE,
            DetailField::CarBrand => field::CAR_BRAND,
            DetailField::CarModel => field::CAR_MODEL,
            DetailField::CarYear => field::CAR_YEAR,
            DetailField::Description => field::CUSTOMER_DESCRIPTION,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DetailField::PolicyId => "Policy ID",
            DetailField::StartDate => "Start Date",
            DetailField::Premium => "Premium",
            DetailField::PaymentFrequency => "Payment Frequency",
            DetailField::CoverageLevel => "Coverage Level",
            DetailField::Deductible => "Deductible",
            DetailField::SecondDriver => "Second Driver",
            DetailField::RiskProfile => "Risk Profile",
            DetailField::Accidents => "Accidents",
            DetailField::YearsLicensed => "Years Licensed",
            DetailField::Garage => "Garage",
            DetailField::CarBrand => "Brand",
            DetailField::CarModel => "Model",
            DetailField::CarYear => "Year",
            DetailField::Description => "Description",
        }
    }

    pub fn section(self) -> Section {
        match self {
            DetailField::PolicyId
            | DetailField::StartDate
            | DetailField::Premium
            | DetailField::PaymentFrequency
            | DetailField::CoverageLevel
            | DetailField::Deductible
            | DetailField::SecondDriver => Section::Policy,
            DetailField::RiskProfile
            | DetailField::Accidents
            | DetailField::YearsLicensed
            | DetailField::Garage => Section::Risk,
            DetailField::CarBrand | DetailField::CarModel | DetailField::CarYear => {
                Section::Vehicle
            }
            DetailField::Description => Section::Description,
        }
    }

    fn kind(self) -> ValueKind {
        match self {
            DetailField::Premium | DetailField::Deductible => ValueKind::Money,
            DetailField::StartDate => ValueKind::Date,
            DetailField::SecondDriver | DetailField::Garage => ValueKind::YesNo,
            _ => ValueKind::Text,
        }
    }

    /// Formatted value for this record, or `None` when there is nothing
    /// sensible to show (absent, or a date that does not parse).
    pub fn value(self, record: &CustomerRecord) -> Option<String> {
        let key = self.field();
        match self.kind() {
            ValueKind::Text => record.text(key),
            ValueKind::Money => record
                .number(key)
                .map(format::money)
                .or_else(|| record.text(key)),
            ValueKind::Date => record.text(key).and_then(|raw| format::date(&raw)),
            ValueKind::YesNo => record
                .flag(key)
                .map(|flag| format::yes_no(flag).to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailEntry {
    pub field: DetailField,
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailSection {
    pub section: Section,
    pub entries: Vec<DetailEntry>,
}

/// Group the detail fields of `shape` into sections for one record.
///
/// Only fields the shape carries and the record has a value for are listed;
/// sections with no entries are dropped.
pub fn detail_sections(shape: &ResultShape, record: &CustomerRecord) -> Vec<DetailSection> {
    Section::ALL
        .into_iter()
        .filter_map(|section| {
            let entries: Vec<DetailEntry> = shape
                .details()
                .iter()
                .filter(|detail| detail.section() == section)
                .filter_map(|detail| {
                    detail.value(record).map(|value| DetailEntry {
                        field: *detail,
                        label: detail.label(),
                        value,
                    })
                })
                .collect();
            (!entries.is_empty()).then_some(DetailSection { section, entries })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> CustomerRecord {
        serde_json::from_value(value).expect("record should deserialize")
    }

    #[test]
    fn zero_and_false_values_are_listed() {
        let rec = record(json!({
            "customer_id": "c-1",
            "num_accidents": 0,
            "has_second_driver": false,
            "has_garage": true,
        }));
        let shape = ResultShape::resolve(std::slice::from_ref(&rec));
        let sections = detail_sections(&shape, &rec);
        assert_eq!(sections.len(), 2);

        assert_eq!(sections[0].section, Section::Policy);
        assert_eq!(sections[0].entries[0].label, "Second Driver");
        assert_eq!(sections[0].entries[0].value, "No");

        assert_eq!(sections[1].section, Section::Risk);
        let values: Vec<_> = sections[1]
            .entries
            .iter()
            .map(|entry| (entry.label, entry.value.as_str()))
            .collect();
        assert_eq!(values, vec![("Accidents", "0"), ("Garage", "Yes")]);
    }

    #[test]
    fn sections_keep_fixed_order_and_format_values() {
        let rec = record(json!({
            "policy_id": "p-9",
            "start_date": "2022-03-01 00:00:00",
            "premium_amount": 1023.5,
            "deductible": 500,
            "car_brand": "Volvo",
            "car_model": "Xc",
            "car_year": 2019,
            "customer_description": "Commutes daily.",
        }));
        let shape = ResultShape::resolve(std::slice::from_ref(&rec));
        let sections = detail_sections(&shape, &rec);
        let order: Vec<_> = sections.iter().map(|section| section.section).collect();
        assert_eq!(
            order,
            vec![Section::Policy, Section::Vehicle, Section::Description]
        );
        let policy: Vec<_> = sections[0]
            .entries
            .iter()
            .map(|entry| entry.value.as_str())
            .collect();
        assert_eq!(policy, vec!["p-9", "3/1/2022", "$1023.50", "$500.00"]);
        assert_eq!(sections[2].entries[0].value, "Commutes daily.");
    }

    #[test]
    fn unparseable_start_date_is_skipped() {
        let rec = record(json!({"start_date": "NaT"}));
        let shape = ResultShape::resolve(std::slice::from_ref(&rec));
        assert!(detail_sections(&shape, &rec).is_empty());
    }

    #[test]
    fn fields_missing_from_first_record_are_not_shown() {
        let first = record(json!({"customer_id": "a"}));
        let second = record(json!({"customer_id": "b", "car_model": "Golf"}));
        let shape = ResultShape::resolve(&[first, second.clone()]);
        assert!(detail_sections(&shape, &second).is_empty());
    }
}
