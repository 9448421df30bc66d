use super::{ColumnRef, FilterOption, FilterType, TableColumn, TableShape};

/// Declares a closed column enum with its wire tags and physical columns.
/// Text filters and searches point at the `*_search` key columns, sorts at
/// the displayed ones.
macro_rules! table_columns {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident = $tag:literal => ($table:literal, $column:literal),)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
        }

        impl TableColumn for $name {
            fn tag(self) -> &'static str {
                match self {
                    $(Self::$variant => $tag,)+
                }
            }

            fn column(self) -> ColumnRef {
                match self {
                    $(Self::$variant => ColumnRef {
                        table: $table,
                        column: $column,
                    },)+
                }
            }

            fn all() -> &'static [Self] {
                &[$(Self::$variant,)+]
            }
        }
    };
}

table_columns! {
    pub enum ExpenseSortColumn {
        Name = "name" => ("expenses", "name"),
        Cost = "cost" => ("expenses", "cost_minor"),
        Category = "category" => ("categories", "name"),
        RecurrenceRate = "recurrence_rate" => ("expenses", "recurrence_rate"),
        StartDate = "start_date" => ("expenses", "start_date"),
        EndDate = "end_date" => ("expenses", "end_date"),
        CreatedAt = "created_at" => ("expenses", "created_at"),
    }
}

table_columns! {
    pub enum ExpenseFilterOption {
        Cost = "cost" => ("expenses", "cost_minor"),
        StartDate = "start_date" => ("expenses", "start_date"),
        EndDate = "end_date" => ("expenses", "end_date"),
        Name = "name" => ("expenses", "name_search"),
        Description = "description" => ("expenses", "description_search"),
        Category = "category" => ("categories", "name_search"),
        RecurrenceRate = "recurrence_rate" => ("expenses", "recurrence_rate"),
    }
}

impl FilterOption for ExpenseFilterOption {
    fn filter_type(self) -> FilterType {
        match self {
            Self::Cost => FilterType::NumberRange,
            Self::StartDate | Self::EndDate => FilterType::DateRange,
            Self::Name | Self::Description | Self::Category | Self::RecurrenceRate => {
                FilterType::Text
            }
        }
    }
}

table_columns! {
    pub enum ExpenseSearchColumn {
        Name = "name" => ("expenses", "name_search"),
        Description = "description" => ("expenses", "description_search"),
        Category = "category" => ("categories", "name_search"),
    }
}

/// The expense listing: expenses left-joined to their category.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExpenseTable;

impl TableShape for ExpenseTable {
    type Sort = ExpenseSortColumn;
    type Filter = ExpenseFilterOption;
    type Search = ExpenseSearchColumn;

    const TOGGLE_COLUMN: ColumnRef = ColumnRef {
        table: "expenses",
        column: "active",
    };
    const TOGGLE_VISIBLE_VALUE: bool = true;
    const TIE_BREAKER: ColumnRef = ColumnRef {
        table: "expenses",
        column: "id",
    };
}

table_columns! {
    pub enum PaymentSortColumn {
        Name = "name" => ("expenses", "name"),
        Cost = "cost" => ("payments", "cost_minor"),
        PaymentDate = "payment_date" => ("payments", "payment_date"),
        DueDatePaid = "due_date_paid" => ("payments", "due_date_paid"),
        Category = "category" => ("categories", "name"),
        CreditCard = "credit_card" => ("credit_cards", "company"),
    }
}

table_columns! {
    pub enum PaymentFilterOption {
        Cost = "cost" => ("payments", "cost_minor"),
        PaymentDate = "payment_date" => ("payments", "payment_date"),
        DueDatePaid = "due_date_paid" => ("payments", "due_date_paid"),
        Name = "name" => ("expenses", "name_search"),
        Category = "category" => ("categories", "name_search"),
        CreditCard = "credit_card" => ("credit_cards", "company_search"),
    }
}

impl FilterOption for PaymentFilterOption {
    fn filter_type(self) -> FilterType {
        match self {
            Self::Cost => FilterType::NumberRange,
            Self::PaymentDate | Self::DueDatePaid => FilterType::DateRange,
            Self::Name | Self::Category | Self::CreditCard => FilterType::Text,
        }
    }
}

table_columns! {
    pub enum PaymentSearchColumn {
        Name = "name" => ("expenses", "name_search"),
        Category = "category" => ("categories", "name_search"),
        CreditCard = "credit_card" => ("credit_cards", "company_search"),
    }
}

/// The payment listing: payments joined to their expense, the expense's
/// category and the charged card.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PaymentTable;

impl TableShape for PaymentTable {
    type Sort = PaymentSortColumn;
    type Filter = PaymentFilterOption;
    type Search = PaymentSearchColumn;

    const TOGGLE_COLUMN: ColumnRef = ColumnRef {
        table: "payments",
        column: "skipped",
    };
    const TOGGLE_VISIBLE_VALUE: bool = false;
    const TIE_BREAKER: ColumnRef = ColumnRef {
        table: "payments",
        column: "id",
    };
}
