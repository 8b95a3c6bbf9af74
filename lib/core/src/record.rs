use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::normalize::normalize;

/// One column of the design list.
///
/// The delimited-text export uses the Korean header names; the relational
/// table uses the ASCII column names. Both spellings are accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Code,
    Customer,
    Designer,
    Fabricator,
    PartName,
    Product,
    Category,
    MoldSize,
    Material,
    StockSize,
    PartSize,
    Structure,
    SetYn,
    Process,
    ImagePath,
}

impl Column {
    /// All columns in export order.
    pub const ALL: [Column; 15] = [
        Column::Code,
        Column::Customer,
        Column::Designer,
        Column::Fabricator,
        Column::PartName,
        Column::Product,
        Column::Category,
        Column::MoldSize,
        Column::Material,
        Column::StockSize,
        Column::PartSize,
        Column::Structure,
        Column::SetYn,
        Column::Process,
        Column::ImagePath,
    ];

    /// Header used in the delimited-text export.
    pub fn header(self) -> &'static str {
        match self {
            Column::Code => "제번",
            Column::Customer => "고객사",
            Column::Designer => "설계",
            Column::Fabricator => "제작처",
            Column::PartName => "품명",
            Column::Product => "제품",
            Column::Category => "제품종류",
            Column::MoldSize => "금형사이즈",
            Column::Material => "재질",
            Column::StockSize => "자재사이즈",
            Column::PartSize => "제품사이즈",
            Column::Structure => "구조",
            Column::SetYn => "SET",
            Column::Process => "공정",
            Column::ImagePath => "image_path",
        }
    }

    /// Column name in the relational table.
    pub fn db_name(self) -> &'static str {
        match self {
            Column::Code => "code",
            Column::Customer => "customer",
            Column::Designer => "designer",
            Column::Fabricator => "fabricator",
            Column::PartName => "part_name",
            Column::Product => "product",
            Column::Category => "category",
            Column::MoldSize => "mold_size",
            Column::Material => "material",
            Column::StockSize => "stock_size",
            Column::PartSize => "part_size",
            Column::Structure => "structure",
            Column::SetYn => "set_yn",
            Column::Process => "process",
            Column::ImagePath => "image_path",
        }
    }

    /// Resolve a header cell to a column. Matches the export header, the
    /// relational name and `set_yn` for the set flag, ignoring surrounding
    /// whitespace and ASCII case.
    pub fn from_header(name: &str) -> Option<Column> {
        let name = name.trim();
        Column::ALL.into_iter().find(|c| {
            c.header().eq_ignore_ascii_case(name) || c.db_name().eq_ignore_ascii_case(name)
        })
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

fn text_or_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// A prior mold design.
///
/// Serialized with the export headers as keys so JSON clients see the same
/// names as the spreadsheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignRecord {
    #[serde(rename = "제번", alias = "code", default, deserialize_with = "text_or_empty")]
    pub code: String,
    #[serde(rename = "고객사", alias = "customer", default)]
    pub customer: Option<String>,
    #[serde(rename = "설계", alias = "designer", default)]
    pub designer: Option<String>,
    #[serde(rename = "제작처", alias = "fabricator", default)]
    pub fabricator: Option<String>,
    #[serde(rename = "품명", alias = "part_name", default, deserialize_with = "text_or_empty")]
    pub part_name: String,
    #[serde(rename = "제품", alias = "product", default)]
    pub product: Option<String>,
    #[serde(rename = "제품종류", alias = "category", default, deserialize_with = "text_or_empty")]
    pub category: String,
    #[serde(rename = "금형사이즈", alias = "mold_size", default)]
    pub mold_size: Option<String>,
    #[serde(rename = "재질", alias = "material", default)]
    pub material: Option<String>,
    #[serde(rename = "자재사이즈", alias = "stock_size", default)]
    pub stock_size: Option<String>,
    #[serde(rename = "제품사이즈", alias = "part_size", default)]
    pub part_size: Option<String>,
    #[serde(rename = "구조", alias = "structure", default)]
    pub structure: Option<String>,
    #[serde(rename = "SET", alias = "set_yn", default)]
    pub set_yn: Option<String>,
    #[serde(rename = "공정", alias = "process", default)]
    pub process: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
}

impl DesignRecord {
    #[inline]
    #[must_use]
    pub fn new(code: impl Into<String>, category: impl Into<String>, part_name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            category: category.into(),
            part_name: part_name.into(),
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn with_customer(mut self, customer: impl Into<String>) -> Self {
        self.customer = Some(customer.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    /// Read a column as text. Empty strings read as `None`.
    pub fn get(&self, column: Column) -> Option<&str> {
        let value = match column {
            Column::Code => Some(self.code.as_str()),
            Column::Customer => self.customer.as_deref(),
            Column::Designer => self.designer.as_deref(),
            Column::Fabricator => self.fabricator.as_deref(),
            Column::PartName => Some(self.part_name.as_str()),
            Column::Product => self.product.as_deref(),
            Column::Category => Some(self.category.as_str()),
            Column::MoldSize => self.mold_size.as_deref(),
            Column::Material => self.material.as_deref(),
            Column::StockSize => self.stock_size.as_deref(),
            Column::PartSize => self.part_size.as_deref(),
            Column::Structure => self.structure.as_deref(),
            Column::SetYn => self.set_yn.as_deref(),
            Column::Process => self.process.as_deref(),
            Column::ImagePath => self.image_path.as_deref(),
        };
        value.filter(|v| !v.is_empty())
    }

    /// Write a column. `None` (or an empty string) clears optional columns
    /// and empties the required text columns.
    pub fn set(&mut self, column: Column, value: Option<&str>) {
        let value = value.filter(|v| !v.is_empty()).map(str::to_string);
        match column {
            Column::Code => self.code = value.unwrap_or_default(),
            Column::Customer => self.customer = value,
            Column::Designer => self.designer = value,
            Column::Fabricator => self.fabricator = value,
            Column::PartName => self.part_name = value.unwrap_or_default(),
            Column::Product => self.product = value,
            Column::Category => self.category = value.unwrap_or_default(),
            Column::MoldSize => self.mold_size = value,
            Column::Material => self.material = value,
            Column::StockSize => self.stock_size = value,
            Column::PartSize => self.part_size = value,
            Column::Structure => self.structure = value,
            Column::SetYn => self.set_yn = value,
            Column::Process => self.process = value,
            Column::ImagePath => self.image_path = value,
        }
    }

    /// Text the vectorizer sees for this record.
    #[inline]
    pub fn search_key(&self) -> String {
        search_key(&self.category, &self.part_name)
    }
}

/// `trim(category + " " + normalize(part_name))`
pub fn search_key(category: &str, part_name: &str) -> String {
    format!("{} {}", category, normalize(Some(part_name)))
        .trim()
        .to_string()
}

/// Loaded design records plus their derived search keys.
///
/// Row order is the source order and is the index space of any
/// document-term matrix fitted from this table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordTable {
    records: Vec<DesignRecord>,
    search_keys: Vec<String>,
}

impl RecordTable {
    pub fn new(records: Vec<DesignRecord>) -> Self {
        let search_keys = records.iter().map(DesignRecord::search_key).collect();
        Self {
            records,
            search_keys,
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn get(&self, row: usize) -> Option<&DesignRecord> {
        self.records.get(row)
    }

    #[inline]
    pub fn search_key(&self, row: usize) -> Option<&str> {
        self.search_keys.get(row).map(String::as_str)
    }

    #[inline]
    pub fn records(&self) -> &[DesignRecord] {
        &self.records
    }

    #[inline]
    pub fn search_keys(&self) -> &[String] {
        &self.search_keys
    }

    #[inline]
    pub fn last(&self) -> Option<&DesignRecord> {
        self.records.last()
    }
}

impl FromIterator<DesignRecord> for RecordTable {
    fn from_iter<I: IntoIterator<Item = DesignRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
