pub mod plan_fields;
pub mod plan_page;
pub mod sheet_row;
