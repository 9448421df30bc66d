mod common;

use common::{ALICE, BOB, d, engine_with_db, expense_input};
use engine::{
    EngineError, ExpenseAction, ExpenseFilterOption, ExpenseSearchColumn, ExpenseSortColumn,
    ExpenseTable, MoneyCents, PayDueDates, PaymentAction, PaymentSearchColumn, PaymentSortColumn,
    PaymentTable, RawFilter, RawTableQuery, RecurrenceRate, SortDirection, TableQuery,
};

#[tokio::test]
async fn expense_listing_filters_by_cost_and_category() {
    let (engine, _db) = engine_with_db().await;
    let food = engine.new_category(ALICE, "Food").await.unwrap();
    let fun = engine.new_category(ALICE, "Fun").await.unwrap();

    for (name, cents, category) in [
        ("Groceries", 4_000, Some(food.id)),
        ("Restaurant", 9_000, Some(food.id)),
        ("Cinema", 2_000, Some(fun.id)),
        ("Snacks", 1_500, None),
    ] {
        let mut input = expense_input(name, cents, RecurrenceRate::Weekly, d(2024, 1, 1));
        input.category_id = category;
        engine.new_expense(ALICE, input).await.unwrap();
    }

    let raw = RawTableQuery {
        sort_column: "cost".to_string(),
        sort_direction: "asc".to_string(),
        filters: vec![
            RawFilter {
                filter_option: "cost".to_string(),
                value1: Some("10".to_string()),
                value2: Some("50".to_string()),
            },
            RawFilter {
                filter_option: "category".to_string(),
                value1: Some("FOO".to_string()),
                value2: None,
            },
        ],
        ..Default::default()
    };
    let query = TableQuery::<ExpenseTable>::parse(&raw).unwrap();
    let rows = engine
        .list_expenses(ALICE, &query, d(2024, 3, 20))
        .await
        .unwrap();

    let names: Vec<&str> = rows.iter().map(|row| row.expense.name.as_str()).collect();
    assert_eq!(names, vec!["Groceries"]);
    assert_eq!(rows[0].category_name.as_deref(), Some("Food"));
}

#[tokio::test]
async fn expense_listing_sorts_searches_and_hides_inactive() {
    let (engine, _db) = engine_with_db().await;
    let a = engine
        .new_expense(ALICE, expense_input("Water bill", 3_000, RecurrenceRate::Monthly, d(2024, 1, 1)))
        .await
        .unwrap();
    engine
        .new_expense(ALICE, expense_input("Power bill", 5_000, RecurrenceRate::Monthly, d(2024, 1, 1)))
        .await
        .unwrap();
    engine
        .new_expense(ALICE, expense_input("Rent", 90_000, RecurrenceRate::Monthly, d(2024, 1, 1)))
        .await
        .unwrap();
    engine
        .new_expense(BOB, expense_input("Bob's bill", 1_000, RecurrenceRate::Monthly, d(2024, 1, 1)))
        .await
        .unwrap();
    engine.set_expense_active(ALICE, a.id, false).await.unwrap();

    let query = TableQuery::<ExpenseTable>::new(ExpenseSortColumn::Cost, SortDirection::Desc)
        .with_search(ExpenseSearchColumn::Name, "BILL");
    let rows = engine
        .list_expenses(ALICE, &query, d(2024, 3, 20))
        .await
        .unwrap();
    let names: Vec<&str> = rows.iter().map(|row| row.expense.name.as_str()).collect();
    assert_eq!(names, vec!["Power bill"]);

    let rows = engine
        .list_expenses(ALICE, &query.show_hidden(true), d(2024, 3, 20))
        .await
        .unwrap();
    let names: Vec<&str> = rows.iter().map(|row| row.expense.name.as_str()).collect();
    assert_eq!(names, vec!["Power bill", "Water bill"]);
    assert!(!rows[1].active);
    assert!(rows[1].actions[&ExpenseAction::Activate]);
}

#[tokio::test]
async fn expense_rows_carry_due_state() {
    let (engine, _db) = engine_with_db().await;
    let rent = engine
        .new_expense(ALICE, expense_input("Rent", 1_000, RecurrenceRate::Monthly, d(2024, 1, 15)))
        .await
        .unwrap();
    engine
        .pay_due_dates(
            ALICE,
            PayDueDates {
                expense_id: rent.id,
                due_dates: vec![d(2024, 1, 15)],
                date_paid: None,
                is_skipped: false,
                credit_card_id: None,
            },
        )
        .await
        .unwrap();

    let query = TableQuery::<ExpenseTable>::new(ExpenseSortColumn::Name, SortDirection::Asc);
    let rows = engine
        .list_expenses(ALICE, &query, d(2024, 3, 20))
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].late_count, 2);
    assert_eq!(rows[0].next_due_date, Some(d(2024, 4, 15)));
    assert!(rows[0].actions[&ExpenseAction::PayToNow]);
    assert!(rows[0].actions[&ExpenseAction::Deactivate]);
}

#[tokio::test]
async fn expense_listing_filters_by_start_date() {
    let (engine, _db) = engine_with_db().await;
    for (name, start) in [("Old", d(2023, 6, 1)), ("New", d(2024, 2, 1))] {
        engine
            .new_expense(ALICE, expense_input(name, 100, RecurrenceRate::Yearly, start))
            .await
            .unwrap();
    }

    let query = TableQuery::<ExpenseTable>::new(ExpenseSortColumn::StartDate, SortDirection::Asc)
        .with_filter(ExpenseFilterOption::StartDate, Some("2024-01-01"), None);
    let rows = engine
        .list_expenses(ALICE, &query, d(2024, 3, 20))
        .await
        .unwrap();
    let names: Vec<&str> = rows.iter().map(|row| row.expense.name.as_str()).collect();
    assert_eq!(names, vec!["New"]);
}

#[tokio::test]
async fn payment_listing_joins_card_and_hides_skipped() {
    let (engine, _db) = engine_with_db().await;
    let card = engine.new_credit_card(ALICE, "Visa Gold").await.unwrap();
    let gym = engine
        .new_expense(ALICE, expense_input("Gym", 3_000, RecurrenceRate::Weekly, d(2024, 3, 4)))
        .await
        .unwrap();

    engine
        .pay_due_dates(
            ALICE,
            PayDueDates {
                expense_id: gym.id,
                due_dates: vec![d(2024, 3, 4)],
                date_paid: Some(d(2024, 3, 5)),
                is_skipped: false,
                credit_card_id: Some(card.id),
            },
        )
        .await
        .unwrap();
    engine
        .pay_due_dates(
            ALICE,
            PayDueDates {
                expense_id: gym.id,
                due_dates: vec![d(2024, 3, 11)],
                date_paid: None,
                is_skipped: true,
                credit_card_id: None,
            },
        )
        .await
        .unwrap();

    let raw = RawTableQuery {
        sort_column: "due_date_paid".to_string(),
        sort_direction: "desc".to_string(),
        search_column: Some("credit_card".to_string()),
        search_value: Some("gold".to_string()),
        ..Default::default()
    };
    let query = TableQuery::<PaymentTable>::parse(&raw).unwrap();
    let rows = engine.list_payments(ALICE, &query).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].expense_name, "Gym");
    assert_eq!(rows[0].credit_card_company.as_deref(), Some("Visa Gold"));
    assert_eq!(rows[0].payment.cost, MoneyCents::new(3_000));
    assert!(rows[0].actions[&PaymentAction::Unpay]);

    let all = TableQuery::<PaymentTable>::new(PaymentSortColumn::DueDatePaid, SortDirection::Desc)
        .show_hidden(true);
    let rows = engine.list_payments(ALICE, &all).await.unwrap();
    let dates: Vec<_> = rows.iter().map(|row| row.payment.due_date_paid).collect();
    assert_eq!(dates, vec![d(2024, 3, 11), d(2024, 3, 4)]);
    assert!(rows[0].payment.skipped);

    assert!(engine.list_payments(BOB, &all).await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_queries_are_rejected_before_touching_storage() {
    let (engine, _db) = engine_with_db().await;
    let query = TableQuery::<ExpenseTable>::new(ExpenseSortColumn::Name, SortDirection::Asc)
        .with_filter(ExpenseFilterOption::EndDate, None, None);
    let err = engine
        .list_expenses(ALICE, &query, d(2024, 3, 20))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation { ref field, .. } if field == "end_date"));

    let raw = RawTableQuery {
        sort_column: "name".to_string(),
        sort_direction: "asc".to_string(),
        filters: vec![RawFilter {
            filter_option: "name; DROP TABLE expenses".to_string(),
            value1: Some("x".to_string()),
            value2: None,
        }],
        ..Default::default()
    };
    assert!(matches!(
        TableQuery::<ExpenseTable>::parse(&raw),
        Err(EngineError::Validation { .. })
    ));
}

#[tokio::test]
async fn text_matching_folds_non_ascii_case_and_accents() {
    let (engine, _db) = engine_with_db().await;
    let card = engine.new_credit_card(ALICE, "Crédit Mutuel").await.unwrap();
    let epices = engine.new_category(ALICE, "Épices").await.unwrap();
    let mut input = expense_input("Épicerie", 4_500, RecurrenceRate::Monthly, d(2024, 1, 10));
    input.category_id = Some(epices.id);
    input.description = Some("Marché du SAMEDI".to_string());
    let epicerie = engine.new_expense(ALICE, input).await.unwrap();
    engine
        .new_expense(ALICE, expense_input("Pharmacie", 900, RecurrenceRate::Monthly, d(2024, 1, 10)))
        .await
        .unwrap();

    for needle in ["Épicerie", "épicerie", "ÉPICERIE", "epicerie", "PICER"] {
        let query = TableQuery::<ExpenseTable>::new(ExpenseSortColumn::Name, SortDirection::Asc)
            .with_filter(ExpenseFilterOption::Name, Some(needle), None);
        let rows = engine
            .list_expenses(ALICE, &query, d(2024, 3, 20))
            .await
            .unwrap();
        let names: Vec<&str> = rows.iter().map(|row| row.expense.name.as_str()).collect();
        assert_eq!(names, vec!["Épicerie"], "{needle}");
    }

    let query = TableQuery::<ExpenseTable>::new(ExpenseSortColumn::Name, SortDirection::Asc)
        .with_search(ExpenseSearchColumn::Description, "marché du samedi");
    let rows = engine
        .list_expenses(ALICE, &query, d(2024, 3, 20))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);

    let query = TableQuery::<ExpenseTable>::new(ExpenseSortColumn::Name, SortDirection::Asc)
        .with_filter(ExpenseFilterOption::Category, Some("ÉPICES"), None);
    let rows = engine
        .list_expenses(ALICE, &query, d(2024, 3, 20))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].category_name.as_deref(), Some("Épices"));

    engine
        .pay_due_dates(
            ALICE,
            PayDueDates {
                expense_id: epicerie.id,
                due_dates: vec![d(2024, 1, 10)],
                date_paid: Some(d(2024, 1, 10)),
                is_skipped: false,
                credit_card_id: Some(card.id),
            },
        )
        .await
        .unwrap();
    let query = TableQuery::<PaymentTable>::new(PaymentSortColumn::Name, SortDirection::Asc)
        .with_search(PaymentSearchColumn::CreditCard, "CRÉDIT");
    let rows = engine.list_payments(ALICE, &query).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].credit_card_company.as_deref(), Some("Crédit Mutuel"));
}

#[tokio::test]
async fn renamed_category_is_found_by_its_new_name() {
    let (engine, _db) = engine_with_db().await;
    let cat = engine.new_category(ALICE, "Misc").await.unwrap();
    let mut input = expense_input("Tea", 300, RecurrenceRate::Weekly, d(2024, 1, 1));
    input.category_id = Some(cat.id);
    engine.new_expense(ALICE, input).await.unwrap();
    engine.rename_category(ALICE, cat.id, "Thé vert").await.unwrap();

    let query = TableQuery::<ExpenseTable>::new(ExpenseSortColumn::Name, SortDirection::Asc)
        .with_search(ExpenseSearchColumn::Category, "THÉ");
    let rows = engine
        .list_expenses(ALICE, &query, d(2024, 3, 20))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}
