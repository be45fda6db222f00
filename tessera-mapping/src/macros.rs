//! Declarative auto-mapping helper.
//!
//! `map_columns!` is the registration-time stand-in for reflective
//! auto-mapping: it maps each listed `field: Type` pair onto the builder,
//! deriving the storage column name from the field name and the value
//! type from the Rust type via [`crate::ColumnType`]. Fields not listed
//! are never mapped.

/// Map a list of record fields onto a [`crate::TableMappingBuilder`].
///
/// ```
/// use tessera_mapping::{map_columns, TableMapping};
/// use tessera_core::Timestamp;
///
/// let builder = TableMapping::builder(Some("reg"), "asset");
/// let mapping = map_columns!(builder, {
///     name: String,
///     acquired_at: Option<Timestamp>,
///     unit_count: i32,
/// })
/// .build()
/// .unwrap();
///
/// assert_eq!(mapping.column_for("unit_count").unwrap().column, "unit_count");
/// ```
#[macro_export]
macro_rules! map_columns {
    ($builder:expr, { $($field:ident : $ty:ty),* $(,)? }) => {{
        let builder = $builder;
        $(
            let builder = builder.property_of::<$ty>(stringify!($field));
        )*
        builder
    }};
}
