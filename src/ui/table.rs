use tabled::{Table, Tabled, settings::Style};

#[derive(Tabled)]
pub struct MetricRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

pub struct TableBuilder {
    rows: Vec<MetricRow>,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBuilder {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn add_row(&mut self, label: &str, value: impl ToString) {
        self.rows.push(MetricRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        render(&self.rows)
    }
}

/// One line of `qmlcatalog types`
#[derive(Tabled)]
pub struct TypeRow {
    #[tabled(rename = "Id")]
    pub id: i64,
    #[tabled(rename = "Type")]
    pub name: String,
    #[tabled(rename = "Prototype")]
    pub prototype: String,
    #[tabled(rename = "Exports")]
    pub exports: String,
    #[tabled(rename = "Kind")]
    pub kind: &'static str,
    #[tabled(rename = "Traits")]
    pub traits: String,
}

/// One line of `qmlcatalog properties`
#[derive(Tabled)]
pub struct PropertyRow {
    #[tabled(rename = "Id")]
    pub id: i64,
    #[tabled(rename = "Property")]
    pub name: String,
    #[tabled(rename = "Declared on")]
    pub owner: String,
    #[tabled(rename = "Type")]
    pub property_type: String,
    #[tabled(rename = "Traits")]
    pub traits: String,
    #[tabled(rename = "Alias of")]
    pub alias: String,
}

pub fn types_table(rows: &[TypeRow]) -> String {
    render(rows)
}

pub fn properties_table(rows: &[PropertyRow]) -> String {
    render(rows)
}

fn render<T: Tabled>(rows: &[T]) -> String {
    if rows.is_empty() {
        return String::new();
    }
    Table::new(rows).with(Style::rounded()).to_string()
}
