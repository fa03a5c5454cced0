use crate::schema::{
    ColumnSpec, ColumnType, ConstraintSpec, DefaultValue, FkAction, SchemaDescriptor, TableSpec,
};

fn text(name: &str) -> ColumnSpec {
    ColumnSpec::new(name, ColumnType::Text)
}

fn created_at() -> ColumnSpec {
    ColumnSpec::new("created_at", ColumnType::Timestamp).default(DefaultValue::CurrentTimestamp)
}

fn updated_at() -> ColumnSpec {
    ColumnSpec::new("updated_at", ColumnType::Timestamp).default(DefaultValue::CurrentTimestamp)
}

/// Tables the HTTP API reads and writes, in dependency order.
///
/// Databases created by older releases converge to this shape on startup:
/// `payment_method` and `beneficiary` on expenses are filled from the
/// legacy `pay_method` and `recipient` columns, and legacy expense columns
/// the API no longer writes lose their NOT NULL.
pub fn business_schema() -> SchemaDescriptor {
    SchemaDescriptor::new()
        .table(
            TableSpec::new("clients")
                .column(ColumnSpec::id("id"))
                .column(text("name").not_null())
                .column(text("phone").not_null().unique())
                .column(text("email"))
                .column(text("area").not_null())
                .column(text("address"))
                .column(text("type").default_text("regular"))
                .column(text("source").default_text("reference"))
                .column(text("notes"))
                .column(ColumnSpec::new("total_orders", ColumnType::Integer).default(DefaultValue::Integer(0)))
                .column(ColumnSpec::new("total_purchases", ColumnType::Real).default(DefaultValue::Real(0.0)))
                .column(ColumnSpec::new("last_order", ColumnType::Date))
                .column(text("status").default_text("active"))
                .column(created_at())
                .column(updated_at()),
        )
        .table(
            TableSpec::new("employees")
                .column(ColumnSpec::id("id"))
                .column(text("name").not_null())
                .column(text("job_title"))
                .column(text("department").not_null())
                .column(ColumnSpec::new("salary", ColumnType::Real).not_null())
                .column(text("phone"))
                .column(text("social_number"))
                .column(ColumnSpec::new("hire_date", ColumnType::Date))
                .column(text("status").default_text("active"))
                .column(text("documents"))
                .column(text("notes"))
                .column(created_at())
                .column(updated_at()),
        )
        .table(
            TableSpec::new("vehicles")
                .column(ColumnSpec::id("id"))
                .column(text("number").not_null().unique())
                .column(text("driver_name"))
                .column(text("current_location"))
                .column(text("capacity"))
                .column(text("model"))
                .column(text("status").default_text("active"))
                .column(ColumnSpec::new("last_maintenance", ColumnType::Date))
                .column(text("notes"))
                .column(created_at()),
        )
        .table(
            TableSpec::new("suppliers")
                .column(ColumnSpec::id("id"))
                .column(text("name").not_null())
                .column(text("source_type").not_null())
                .column(text("area").not_null())
                .column(text("phone"))
                .column(ColumnSpec::new("price_per_meter", ColumnType::Real))
                .column(ColumnSpec::new("price_per_tank", ColumnType::Real))
                .column(text("capacity"))
                .column(text("notes"))
                .column(text("status").default_text("active"))
                .column(created_at()),
        )
        .table(
            TableSpec::new("expense_types")
                .column(ColumnSpec::id("id"))
                .column(text("name").not_null().unique())
                .column(created_at()),
        )
        .table(
            TableSpec::new("revenue")
                .column(ColumnSpec::id("id"))
                .column(ColumnSpec::new("date", ColumnType::Date).not_null())
                .column(text("source").default_text("system"))
                .column(text("type").default_text("water_sale"))
                .column(ColumnSpec::new("amount", ColumnType::Real).not_null())
                .column(ColumnSpec::new("client_id", ColumnType::Integer))
                .column(text("client_name"))
                .column(ColumnSpec::new("vehicle_id", ColumnType::Integer))
                .column(text("vehicle_number"))
                .column(text("payment_method").default_text("cash"))
                .column(text("description"))
                .column(text("notes"))
                .column(text("status").default_text("completed"))
                .column(created_at())
                .column(updated_at())
                .constraint(ConstraintSpec::foreign_key(
                    "client_id",
                    "clients",
                    "id",
                    FkAction::SetNull,
                ))
                .constraint(ConstraintSpec::foreign_key(
                    "vehicle_id",
                    "vehicles",
                    "id",
                    FkAction::SetNull,
                ))
                .constraint(ConstraintSpec::check("amount >= 0")),
        )
        .table(
            TableSpec::new("expenses")
                .column(ColumnSpec::id("id"))
                .column(ColumnSpec::new("date", ColumnType::Date).not_null())
                .column(ColumnSpec::new("type_id", ColumnType::Integer))
                .column(ColumnSpec::new("amount", ColumnType::Real).not_null())
                .column(text("beneficiary").backfill_from("recipient"))
                .column(
                    text("payment_method")
                        .default_text("cash")
                        .backfill_from("pay_method"),
                )
                .column(text("description"))
                .column(text("notes"))
                .column(text("status").default_text("paid"))
                .column(created_at())
                .column(text("type"))
                .column(text("category"))
                .column(text("recipient"))
                .column(text("pay_method"))
                .constraint(ConstraintSpec::foreign_key(
                    "type_id",
                    "expense_types",
                    "id",
                    FkAction::Restrict,
                ))
                .constraint(ConstraintSpec::check("amount >= 0")),
        )
}
