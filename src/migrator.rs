use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_catalog_tables::Migration),
            Box::new(m20240301_000002_create_stock_tables::Migration),
            Box::new(m20240301_000003_create_quotation_tables::Migration),
            Box::new(m20240301_000004_create_purchase_order_tables::Migration),
            Box::new(m20240301_000005_create_goods_receipt_tables::Migration),
            Box::new(m20240301_000006_create_notification_table::Migration),
            Box::new(m20240301_000007_create_task_and_audit_tables::Migration),
        ]
    }
}

mod m20240301_000001_create_catalog_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_catalog_tables"
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
                        .col(ColumnDef::new(Suppliers::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Suppliers::Name).string().not_null())
                        .col(ColumnDef::new(Suppliers::ChatAddress).string().null())
                        .col(ColumnDef::new(Suppliers::EmailAddress).string().null())
                        .col(
                            ColumnDef::new(Suppliers::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Suppliers::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Suppliers::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::Sku).string().not_null())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::PreferredSupplierId).uuid().null())
                        .col(
                            ColumnDef::new(Products::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Products::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Products::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_sku")
                        .table(Products::Table)
                        .col(Products::Sku)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_preferred_supplier")
                        .table(Products::Table)
                        .col(Products::PreferredSupplierId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Suppliers::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Suppliers {
        Table,
        Id,
        Name,
        ChatAddress,
        EmailAddress,
        Active,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Products {
        Table,
        Id,
        Sku,
        Name,
        PreferredSupplierId,
        Active,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000002_create_stock_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_stock_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockLevels::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockLevels::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockLevels::ProductId).uuid().not_null())
                        .col(ColumnDef::new(StockLevels::LocationId).uuid().not_null())
                        .col(
                            ColumnDef::new(StockLevels::OnHand)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockLevels::ReorderThreshold)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockLevels::ReorderQuantity)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(StockLevels::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(StockLevels::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_levels_product_location")
                        .table(StockLevels::Table)
                        .col(StockLevels::ProductId)
                        .col(StockLevels::LocationId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockMovements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockMovements::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::ProductId).uuid().not_null())
                        .col(ColumnDef::new(StockMovements::LocationId).uuid().not_null())
                        .col(
                            ColumnDef::new(StockMovements::Quantity)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::ResultingBalance)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::Kind).string().not_null())
                        .col(ColumnDef::new(StockMovements::ReferenceKind).string().null())
                        .col(ColumnDef::new(StockMovements::ReferenceId).uuid().null())
                        .col(
                            ColumnDef::new(StockMovements::OccurredAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_movements_product_location")
                        .table(StockMovements::Table)
                        .col(StockMovements::ProductId)
                        .col(StockMovements::LocationId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockMovements::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(StockLevels::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum StockLevels {
        Table,
        Id,
        ProductId,
        LocationId,
        OnHand,
        ReorderThreshold,
        ReorderQuantity,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum StockMovements {
        Table,
        Id,
        ProductId,
        LocationId,
        Quantity,
        ResultingBalance,
        Kind,
        ReferenceKind,
        ReferenceId,
        OccurredAt,
    }
}

mod m20240301_000003_create_quotation_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_quotation_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(QuotationRequests::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(QuotationRequests::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(QuotationRequests::Code).string().not_null())
                        .col(ColumnDef::new(QuotationRequests::Status).string().not_null())
                        .col(
                            ColumnDef::new(QuotationRequests::IssuedOn)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(QuotationRequests::ExpiresAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(QuotationRequests::Note).string().null())
                        .col(
                            ColumnDef::new(QuotationRequests::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(QuotationRequests::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_quotation_requests_code")
                        .table(QuotationRequests::Table)
                        .col(QuotationRequests::Code)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_quotation_requests_status")
                        .table(QuotationRequests::Table)
                        .col(QuotationRequests::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(QuotationRequestLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(QuotationRequestLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(QuotationRequestLines::RequestId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(QuotationRequestLines::ProductId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(QuotationRequestLines::SuggestedQuantity)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(QuotationRequestLines::Note).string().null())
                        .col(
                            ColumnDef::new(QuotationRequestLines::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_quotation_request_lines_request")
                        .table(QuotationRequestLines::Table)
                        .col(QuotationRequestLines::RequestId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SupplierQuotes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SupplierQuotes::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SupplierQuotes::RequestId).uuid().not_null())
                        .col(ColumnDef::new(SupplierQuotes::SupplierId).uuid().not_null())
                        .col(ColumnDef::new(SupplierQuotes::Status).string().not_null())
                        .col(ColumnDef::new(SupplierQuotes::RespondedAt).timestamp().null())
                        .col(
                            ColumnDef::new(SupplierQuotes::RejectionReason)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(SupplierQuotes::Attempt)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(SupplierQuotes::Processed)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(SupplierQuotes::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SupplierQuotes::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_supplier_quotes_request_supplier")
                        .table(SupplierQuotes::Table)
                        .col(SupplierQuotes::RequestId)
                        .col(SupplierQuotes::SupplierId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SupplierQuoteLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SupplierQuoteLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SupplierQuoteLines::QuoteId).uuid().not_null())
                        .col(
                            ColumnDef::new(SupplierQuoteLines::ProductId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SupplierQuoteLines::UnitPrice)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SupplierQuoteLines::QuantityAvailable)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SupplierQuoteLines::LeadTimeDays)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(SupplierQuoteLines::Note).string().null())
                        .col(
                            ColumnDef::new(SupplierQuoteLines::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_supplier_quote_lines_quote")
                        .table(SupplierQuoteLines::Table)
                        .col(SupplierQuoteLines::QuoteId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SupplierQuoteLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(SupplierQuotes::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(QuotationRequestLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(QuotationRequests::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum QuotationRequests {
        Table,
        Id,
        Code,
        Status,
        IssuedOn,
        ExpiresAt,
        Note,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum QuotationRequestLines {
        Table,
        Id,
        RequestId,
        ProductId,
        SuggestedQuantity,
        Note,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum SupplierQuotes {
        Table,
        Id,
        RequestId,
        SupplierId,
        Status,
        RespondedAt,
        RejectionReason,
        Attempt,
        Processed,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum SupplierQuoteLines {
        Table,
        Id,
        QuoteId,
        ProductId,
        UnitPrice,
        QuantityAvailable,
        LeadTimeDays,
        Note,
        CreatedAt,
    }
}

mod m20240301_000004_create_purchase_order_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_purchase_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseOrders::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::Number)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::SupplierId).uuid().not_null())
                        .col(ColumnDef::new(PurchaseOrders::QuoteId).uuid().not_null())
                        .col(ColumnDef::new(PurchaseOrders::Status).string().not_null())
                        .col(
                            ColumnDef::new(PurchaseOrders::TotalAmount)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::IssuedOn)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::Note).string().null())
                        .col(
                            ColumnDef::new(PurchaseOrders::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Unique quote_id enforces the 1:1 quote-to-order relationship
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_purchase_orders_quote")
                        .table(PurchaseOrders::Table)
                        .col(PurchaseOrders::QuoteId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_purchase_orders_number")
                        .table(PurchaseOrders::Table)
                        .col(PurchaseOrders::Number)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrderLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseOrderLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrderLines::OrderId).uuid().not_null())
                        .col(
                            ColumnDef::new(PurchaseOrderLines::ProductId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderLines::QuantityOrdered)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderLines::QuantityReceived)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderLines::UnitPrice)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderLines::PriceEstimated)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(PurchaseOrderLines::Note).string().null())
                        .col(
                            ColumnDef::new(PurchaseOrderLines::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderLines::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_purchase_order_lines_order")
                        .table(PurchaseOrderLines::Table)
                        .col(PurchaseOrderLines::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PurchaseOrderLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PurchaseOrders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum PurchaseOrders {
        Table,
        Id,
        Number,
        SupplierId,
        QuoteId,
        Status,
        TotalAmount,
        IssuedOn,
        Note,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum PurchaseOrderLines {
        Table,
        Id,
        OrderId,
        ProductId,
        QuantityOrdered,
        QuantityReceived,
        UnitPrice,
        PriceEstimated,
        Note,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000005_create_goods_receipt_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000005_create_goods_receipt_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(GoodsReceipts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(GoodsReceipts::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(GoodsReceipts::OrderId).uuid().not_null())
                        .col(ColumnDef::new(GoodsReceipts::Kind).string().not_null())
                        .col(
                            ColumnDef::new(GoodsReceipts::ReceivedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(GoodsReceipts::ReceivedBy).string().not_null())
                        .col(ColumnDef::new(GoodsReceipts::Note).string().null())
                        .col(
                            ColumnDef::new(GoodsReceipts::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_goods_receipts_order")
                        .table(GoodsReceipts::Table)
                        .col(GoodsReceipts::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(GoodsReceiptLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(GoodsReceiptLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(GoodsReceiptLines::ReceiptId).uuid().not_null())
                        .col(
                            ColumnDef::new(GoodsReceiptLines::OrderLineId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(GoodsReceiptLines::Quantity)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(GoodsReceiptLines::Note).string().null())
                        .col(
                            ColumnDef::new(GoodsReceiptLines::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(GoodsReceiptLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(GoodsReceipts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum GoodsReceipts {
        Table,
        Id,
        OrderId,
        Kind,
        ReceivedAt,
        ReceivedBy,
        Note,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum GoodsReceiptLines {
        Table,
        Id,
        ReceiptId,
        OrderLineId,
        Quantity,
        Note,
        CreatedAt,
    }
}

mod m20240301_000006_create_notification_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000006_create_notification_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OutboundNotifications::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OutboundNotifications::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OutboundNotifications::TargetKind)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OutboundNotifications::TargetId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OutboundNotifications::Channel)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OutboundNotifications::Address)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OutboundNotifications::Subject)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OutboundNotifications::BodyTemplate)
                                .text()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OutboundNotifications::Variables)
                                .json()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OutboundNotifications::Status)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OutboundNotifications::Attempts)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(OutboundNotifications::MaxAttempts)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OutboundNotifications::NextEligibleAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OutboundNotifications::LastError)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(OutboundNotifications::SentAt).timestamp().null())
                        .col(
                            ColumnDef::new(OutboundNotifications::ProviderRef)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(OutboundNotifications::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OutboundNotifications::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_outbound_notifications_due")
                        .table(OutboundNotifications::Table)
                        .col(OutboundNotifications::Status)
                        .col(OutboundNotifications::NextEligibleAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_outbound_notifications_target")
                        .table(OutboundNotifications::Table)
                        .col(OutboundNotifications::TargetKind)
                        .col(OutboundNotifications::TargetId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OutboundNotifications::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum OutboundNotifications {
        Table,
        Id,
        TargetKind,
        TargetId,
        Channel,
        Address,
        Subject,
        BodyTemplate,
        Variables,
        Status,
        Attempts,
        MaxAttempts,
        NextEligibleAt,
        LastError,
        SentAt,
        ProviderRef,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000007_create_task_and_audit_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000007_create_task_and_audit_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PostCommitTasks::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PostCommitTasks::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PostCommitTasks::Kind).string().not_null())
                        .col(ColumnDef::new(PostCommitTasks::OrderId).uuid().not_null())
                        .col(ColumnDef::new(PostCommitTasks::Status).string().not_null())
                        .col(
                            ColumnDef::new(PostCommitTasks::Attempts)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(PostCommitTasks::MaxAttempts)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PostCommitTasks::NextEligibleAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PostCommitTasks::LastError).string().null())
                        .col(
                            ColumnDef::new(PostCommitTasks::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PostCommitTasks::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(AuditLog::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(AuditLog::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(AuditLog::AggregateKind).string().not_null())
                        .col(ColumnDef::new(AuditLog::AggregateId).uuid().not_null())
                        .col(ColumnDef::new(AuditLog::Action).string().not_null())
                        .col(ColumnDef::new(AuditLog::Actor).string().not_null())
                        .col(ColumnDef::new(AuditLog::Detail).string().null())
                        .col(ColumnDef::new(AuditLog::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(AuditLog::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PostCommitTasks::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum PostCommitTasks {
        Table,
        Id,
        Kind,
        OrderId,
        Status,
        Attempts,
        MaxAttempts,
        NextEligibleAt,
        LastError,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum AuditLog {
        Table,
        Id,
        AggregateKind,
        AggregateId,
        Action,
        Actor,
        Detail,
        CreatedAt,
    }
}
