use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_users_table::Migration),
            Box::new(m20240101_000002_create_suppliers_table::Migration),
            Box::new(m20240101_000003_create_orders_table::Migration),
            Box::new(m20240101_000004_create_order_suppliers_table::Migration),
            Box::new(m20240101_000005_create_quotes_table::Migration),
            Box::new(m20240315_000006_add_lookup_indexes::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_users_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_users_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Users::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Users::Username)
                                .string_len(50)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                        .col(
                            ColumnDef::new(Users::Role)
                                .string_len(20)
                                .not_null()
                                .default("user"),
                        )
                        .col(ColumnDef::new(Users::BusinessType).string_len(20).not_null())
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Users {
        Table,
        Id,
        Username,
        PasswordHash,
        Role,
        BusinessType,
        CreatedAt,
    }
}

mod m20240101_000002_create_suppliers_table {
    use sea_orm_migration::prelude::*;

    use super::m20240101_000001_create_users_table::Users;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_suppliers_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Suppliers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Suppliers::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Suppliers::Name).string_len(100).not_null())
                        .col(
                            ColumnDef::new(Suppliers::AccessToken)
                                .string_len(64)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Suppliers::WebhookUrl).text().null())
                        .col(ColumnDef::new(Suppliers::UserId).big_integer().not_null())
                        .col(
                            ColumnDef::new(Suppliers::BusinessType)
                                .string_len(20)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Suppliers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk-suppliers-user_id")
                                .from(Suppliers::Table, Suppliers::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // Supplier names are unique within a business-type partition, not
            // globally.
            manager
                .create_index(
                    Index::create()
                        .name("idx-suppliers-name-business_type")
                        .table(Suppliers::Table)
                        .col(Suppliers::Name)
                        .col(Suppliers::BusinessType)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Suppliers::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Suppliers {
        Table,
        Id,
        Name,
        AccessToken,
        WebhookUrl,
        UserId,
        BusinessType,
        CreatedAt,
    }
}

mod m20240101_000003_create_orders_table {
    use sea_orm_migration::prelude::*;

    use super::m20240101_000001_create_users_table::Users;
    use super::m20240101_000002_create_suppliers_table::Suppliers;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Orders::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        // The unique index on order_no is the correctness
                        // backstop for order-number allocation; the retry loop
                        // in the allocator only exists to avoid surfacing the
                        // constraint violation to users.
                        .col(
                            ColumnDef::new(Orders::OrderNo)
                                .string_len(50)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Orders::Warehouse).string_len(200).not_null())
                        .col(ColumnDef::new(Orders::Goods).text().not_null())
                        .col(
                            ColumnDef::new(Orders::DeliveryAddress)
                                .string_len(300)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::Status)
                                .string_len(20)
                                .not_null()
                                .default("active"),
                        )
                        .col(ColumnDef::new(Orders::SelectedSupplierId).big_integer().null())
                        .col(ColumnDef::new(Orders::SelectedPrice).decimal_len(12, 2).null())
                        .col(ColumnDef::new(Orders::UserId).big_integer().not_null())
                        .col(ColumnDef::new(Orders::BusinessType).string_len(20).not_null())
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk-orders-user_id")
                                .from(Orders::Table, Orders::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk-orders-selected_supplier_id")
                                .from(Orders::Table, Orders::SelectedSupplierId)
                                .to(Suppliers::Table, Suppliers::Id),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Orders {
        Table,
        Id,
        OrderNo,
        Warehouse,
        Goods,
        DeliveryAddress,
        Status,
        SelectedSupplierId,
        SelectedPrice,
        UserId,
        BusinessType,
        CreatedAt,
    }
}

mod m20240101_000004_create_order_suppliers_table {
    use sea_orm_migration::prelude::*;

    use super::m20240101_000002_create_suppliers_table::Suppliers;
    use super::m20240101_000003_create_orders_table::Orders;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_order_suppliers_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OrderSuppliers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderSuppliers::OrderId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderSuppliers::SupplierId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderSuppliers::Notified)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .primary_key(
                            Index::create()
                                .col(OrderSuppliers::OrderId)
                                .col(OrderSuppliers::SupplierId),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk-order_suppliers-order_id")
                                .from(OrderSuppliers::Table, OrderSuppliers::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk-order_suppliers-supplier_id")
                                .from(OrderSuppliers::Table, OrderSuppliers::SupplierId)
                                .to(Suppliers::Table, Suppliers::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderSuppliers::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum OrderSuppliers {
        Table,
        OrderId,
        SupplierId,
        Notified,
    }
}

mod m20240101_000005_create_quotes_table {
    use sea_orm_migration::prelude::*;

    use super::m20240101_000002_create_suppliers_table::Suppliers;
    use super::m20240101_000003_create_orders_table::Orders;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_quotes_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Quotes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Quotes::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Quotes::OrderId).big_integer().not_null())
                        .col(ColumnDef::new(Quotes::SupplierId).big_integer().not_null())
                        .col(ColumnDef::new(Quotes::Price).decimal_len(12, 2).not_null())
                        .col(ColumnDef::new(Quotes::DeliveryTime).string_len(50).null())
                        .col(ColumnDef::new(Quotes::Remarks).text().null())
                        .col(
                            ColumnDef::new(Quotes::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk-quotes-order_id")
                                .from(Quotes::Table, Quotes::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk-quotes-supplier_id")
                                .from(Quotes::Table, Quotes::SupplierId)
                                .to(Suppliers::Table, Suppliers::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // One quote per (order, supplier); re-submission updates in place.
            manager
                .create_index(
                    Index::create()
                        .name("idx-quotes-order_id-supplier_id")
                        .table(Quotes::Table)
                        .col(Quotes::OrderId)
                        .col(Quotes::SupplierId)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Quotes::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Quotes {
        Table,
        Id,
        OrderId,
        SupplierId,
        Price,
        DeliveryTime,
        Remarks,
        CreatedAt,
    }
}

mod m20240315_000006_add_lookup_indexes {
    use sea_orm_migration::prelude::*;

    use super::m20240101_000003_create_orders_table::Orders;
    use super::m20240101_000005_create_quotes_table::Quotes;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240315_000006_add_lookup_indexes"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_index(
                    Index::create()
                        .name("idx-orders-user_id")
                        .table(Orders::Table)
                        .col(Orders::UserId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx-orders-status")
                        .table(Orders::Table)
                        .col(Orders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx-quotes-supplier_id")
                        .table(Quotes::Table)
                        .col(Quotes::SupplierId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_index(Index::drop().name("idx-orders-user_id").table(Orders::Table).to_owned())
                .await?;
            manager
                .drop_index(Index::drop().name("idx-orders-status").table(Orders::Table).to_owned())
                .await?;
            manager
                .drop_index(
                    Index::drop()
                        .name("idx-quotes-supplier_id")
                        .table(Quotes::Table)
                        .to_owned(),
                )
                .await
        }
    }
}
