mod common;

use sea_orm::{ConnectionTrait, Statement};

use common::{ALICE, BOB, d, engine_with_db, expense_input, payment_count};
use engine::{EngineError, MoneyCents, PayDueDates, RecurrenceRate};

fn pay(expense_id: uuid::Uuid, dates: &[chrono::NaiveDate]) -> PayDueDates {
    PayDueDates {
        expense_id,
        due_dates: dates.to_vec(),
        date_paid: Some(d(2024, 3, 20)),
        is_skipped: false,
        credit_card_id: None,
    }
}

#[tokio::test]
async fn paying_to_a_card_charges_it_in_the_same_transaction() {
    let (engine, db) = engine_with_db().await;
    let card = engine.new_credit_card(ALICE, "Visa").await.unwrap();
    let rent = engine
        .new_expense(
            ALICE,
            expense_input("Rent", 100_000, RecurrenceRate::Monthly, d(2024, 1, 1)),
        )
        .await
        .unwrap();

    let receipt = engine
        .pay_due_dates(
            ALICE,
            PayDueDates {
                credit_card_id: Some(card.id),
                ..pay(rent.id, &[d(2024, 1, 1), d(2024, 2, 1)])
            },
        )
        .await
        .unwrap();

    assert_eq!(receipt.payment_ids.len(), 2);
    assert_eq!(receipt.due_dates, vec![d(2024, 1, 1), d(2024, 2, 1)]);
    assert_eq!(receipt.credit_card_balance, Some(MoneyCents::new(200_000)));
    assert!(!receipt.overpaid);
    assert_eq!(payment_count(&db, rent.id).await, 2);

    let card = engine.credit_card(ALICE, card.id).await.unwrap();
    assert_eq!(card.running_balance, MoneyCents::new(200_000));
}

#[tokio::test]
async fn settled_occurrences_cannot_be_paid_twice() {
    let (engine, db) = engine_with_db().await;
    let gym = engine
        .new_expense(
            ALICE,
            expense_input("Gym", 3_000, RecurrenceRate::Weekly, d(2024, 3, 4)),
        )
        .await
        .unwrap();

    engine
        .pay_due_dates(ALICE, pay(gym.id, &[d(2024, 3, 4)]))
        .await
        .unwrap();

    let err = engine
        .pay_due_dates(ALICE, pay(gym.id, &[d(2024, 3, 11), d(2024, 3, 4)]))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::DuplicatePayment(_)));

    let err = engine
        .pay_due_dates(ALICE, pay(gym.id, &[d(2024, 3, 11), d(2024, 3, 11)]))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::DuplicatePayment(_)));

    // Neither failed batch left a row behind.
    assert_eq!(payment_count(&db, gym.id).await, 1);
}

#[tokio::test]
async fn only_occurrence_dates_can_be_paid() {
    let (engine, _db) = engine_with_db().await;
    let gym = engine
        .new_expense(
            ALICE,
            expense_input("Gym", 3_000, RecurrenceRate::Weekly, d(2024, 3, 4)),
        )
        .await
        .unwrap();

    let err = engine
        .pay_due_dates(ALICE, pay(gym.id, &[d(2024, 3, 5)]))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation { ref field, .. } if field == "due_dates"));

    let err = engine
        .pay_due_dates(ALICE, pay(gym.id, &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }));
}

#[tokio::test]
async fn skipped_occurrence_can_later_be_paid() {
    let (engine, db) = engine_with_db().await;
    let card = engine.new_credit_card(ALICE, "Amex").await.unwrap();
    let phone = engine
        .new_expense(
            ALICE,
            expense_input("Phone", 2_500, RecurrenceRate::Monthly, d(2024, 1, 10)),
        )
        .await
        .unwrap();

    let skipped = engine
        .pay_due_dates(
            ALICE,
            PayDueDates {
                is_skipped: true,
                credit_card_id: Some(card.id),
                ..pay(phone.id, &[d(2024, 2, 10)])
            },
        )
        .await
        .unwrap();
    assert_eq!(skipped.credit_card_balance, None);
    assert_eq!(
        engine.credit_card(ALICE, card.id).await.unwrap().running_balance,
        MoneyCents::ZERO
    );

    engine
        .pay_due_dates(
            ALICE,
            PayDueDates {
                credit_card_id: Some(card.id),
                ..pay(phone.id, &[d(2024, 2, 10)])
            },
        )
        .await
        .unwrap();
    assert_eq!(payment_count(&db, phone.id).await, 1);
    assert_eq!(
        engine.credit_card(ALICE, card.id).await.unwrap().running_balance,
        MoneyCents::new(2_500)
    );
}

#[tokio::test]
async fn unpay_then_repay_restores_the_ledger() {
    let (engine, db) = engine_with_db().await;
    let card = engine.new_credit_card(ALICE, "Visa").await.unwrap();
    let netflix = engine
        .new_expense(
            ALICE,
            expense_input("Netflix", 1_599, RecurrenceRate::Monthly, d(2024, 1, 5)),
        )
        .await
        .unwrap();
    let request = PayDueDates {
        credit_card_id: Some(card.id),
        ..pay(netflix.id, &[d(2024, 3, 5)])
    };

    let first = engine.pay_due_dates(ALICE, request.clone()).await.unwrap();
    let before_unpay = engine.credit_card(ALICE, card.id).await.unwrap().running_balance;

    let removed = engine
        .unpay_due_dates(ALICE, netflix.id, &first.payment_ids)
        .await
        .unwrap();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].cost, MoneyCents::new(1_599));
    assert_eq!(payment_count(&db, netflix.id).await, 0);
    assert_eq!(
        engine.credit_card(ALICE, card.id).await.unwrap().running_balance,
        MoneyCents::ZERO
    );

    engine.pay_due_dates(ALICE, request).await.unwrap();
    assert_eq!(payment_count(&db, netflix.id).await, 1);
    assert_eq!(
        engine.credit_card(ALICE, card.id).await.unwrap().running_balance,
        before_unpay
    );
}

#[tokio::test]
async fn unpay_rejects_payments_of_another_expense() {
    let (engine, db) = engine_with_db().await;
    let a = engine
        .new_expense(ALICE, expense_input("A", 100, RecurrenceRate::Daily, d(2024, 3, 1)))
        .await
        .unwrap();
    let b = engine
        .new_expense(ALICE, expense_input("B", 100, RecurrenceRate::Daily, d(2024, 3, 1)))
        .await
        .unwrap();
    let paid_a = engine
        .pay_due_dates(ALICE, pay(a.id, &[d(2024, 3, 1)]))
        .await
        .unwrap();
    let paid_b = engine
        .pay_due_dates(ALICE, pay(b.id, &[d(2024, 3, 1)]))
        .await
        .unwrap();

    let ids = [paid_a.payment_ids[0], paid_b.payment_ids[0]];
    let err = engine.unpay_due_dates(ALICE, a.id, &ids).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
    assert_eq!(payment_count(&db, a.id).await, 1);
    assert_eq!(payment_count(&db, b.id).await, 1);
}

#[tokio::test]
async fn pay_all_overdue_pays_every_open_occurrence() {
    let (engine, db) = engine_with_db().await;
    let card = engine.new_credit_card(ALICE, "Visa").await.unwrap();
    let insurance = engine
        .new_expense(
            ALICE,
            expense_input("Insurance", 4_200, RecurrenceRate::Monthly, d(2024, 1, 15)),
        )
        .await
        .unwrap();

    let receipt = engine
        .pay_all_overdue_dates(ALICE, insurance.id, Some(card.id), d(2024, 3, 20))
        .await
        .unwrap();

    assert_eq!(
        receipt.due_dates,
        vec![d(2024, 1, 15), d(2024, 2, 15), d(2024, 3, 15)]
    );
    assert_eq!(payment_count(&db, insurance.id).await, 3);
    assert_eq!(receipt.credit_card_balance, Some(MoneyCents::new(12_600)));

    let again = engine
        .pay_all_overdue_dates(ALICE, insurance.id, Some(card.id), d(2024, 3, 20))
        .await
        .unwrap();
    assert!(again.payment_ids.is_empty());
    assert_eq!(
        engine.credit_card(ALICE, card.id).await.unwrap().running_balance,
        MoneyCents::new(12_600)
    );
}

#[tokio::test]
async fn failed_insert_rolls_back_the_whole_batch() {
    let (engine, db) = engine_with_db().await;
    let card = engine.new_credit_card(ALICE, "Visa").await.unwrap();
    let insurance = engine
        .new_expense(
            ALICE,
            expense_input("Insurance", 4_200, RecurrenceRate::Monthly, d(2024, 1, 15)),
        )
        .await
        .unwrap();

    db.execute(Statement::from_string(
        db.get_database_backend(),
        "CREATE TRIGGER fail_third_payment BEFORE INSERT ON payments \
         WHEN NEW.due_date_paid = '2024-03-15' \
         BEGIN SELECT RAISE(ABORT, 'forced failure'); END;",
    ))
    .await
    .unwrap();

    let err = engine
        .pay_all_overdue_dates(ALICE, insurance.id, Some(card.id), d(2024, 3, 20))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Ledger(_)));
    assert_eq!(err.to_string(), "ledger operation failed");

    assert_eq!(payment_count(&db, insurance.id).await, 0);
    assert_eq!(
        engine.credit_card(ALICE, card.id).await.unwrap().running_balance,
        MoneyCents::ZERO
    );
}

#[tokio::test]
async fn expenses_of_other_users_are_not_found() {
    let (engine, _db) = engine_with_db().await;
    let rent = engine
        .new_expense(
            ALICE,
            expense_input("Rent", 100_000, RecurrenceRate::Monthly, d(2024, 1, 1)),
        )
        .await
        .unwrap();
    let bobs_card = engine.new_credit_card(BOB, "Visa").await.unwrap();

    let err = engine
        .pay_due_dates(BOB, pay(rent.id, &[d(2024, 1, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    let err = engine
        .pay_due_dates(
            ALICE,
            PayDueDates {
                credit_card_id: Some(bobs_card.id),
                ..pay(rent.id, &[d(2024, 1, 1)])
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn automatic_payments_settle_overdue_occurrences() {
    let (engine, db) = engine_with_db().await;
    let card = engine.new_credit_card(ALICE, "Visa").await.unwrap();

    let mut input = expense_input("Cloud", 999, RecurrenceRate::Monthly, d(2024, 2, 1));
    input.automatic_payments = true;
    input.automatic_payment_credit_card_id = Some(card.id);
    let cloud = engine.new_expense(ALICE, input).await.unwrap();
    let manual = engine
        .new_expense(
            ALICE,
            expense_input("Manual", 500, RecurrenceRate::Monthly, d(2024, 2, 1)),
        )
        .await
        .unwrap();

    let outcomes = engine
        .run_automatic_payments(ALICE, d(2024, 3, 20))
        .await
        .unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].expense_id, cloud.id);
    assert_eq!(outcomes[0].paid, vec![d(2024, 2, 1), d(2024, 3, 1)]);
    assert_eq!(payment_count(&db, manual.id).await, 0);
    assert_eq!(
        engine.credit_card(ALICE, card.id).await.unwrap().running_balance,
        MoneyCents::new(1_998)
    );

    let rerun = engine
        .run_automatic_payments(ALICE, d(2024, 3, 20))
        .await
        .unwrap();
    assert!(rerun.is_empty());
}

#[tokio::test]
async fn deleting_an_expense_reverses_its_card_charges() {
    let (engine, db) = engine_with_db().await;
    let card = engine.new_credit_card(ALICE, "Visa").await.unwrap();
    let rent = engine
        .new_expense(
            ALICE,
            expense_input("Rent", 1_000, RecurrenceRate::Monthly, d(2024, 1, 1)),
        )
        .await
        .unwrap();
    engine
        .pay_all_overdue_dates(ALICE, rent.id, Some(card.id), d(2024, 2, 1))
        .await
        .unwrap();

    engine.delete_expense(ALICE, rent.id).await.unwrap();

    assert_eq!(payment_count(&db, rent.id).await, 0);
    assert_eq!(
        engine.credit_card(ALICE, card.id).await.unwrap().running_balance,
        MoneyCents::ZERO
    );
    let err = engine.expense(ALICE, rent.id).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn failed_card_charge_rolls_back_the_payment_insert() {
    let (engine, db) = engine_with_db().await;
    let card = engine.new_credit_card(ALICE, "Visa").await.unwrap();
    let gym = engine
        .new_expense(
            ALICE,
            expense_input("Gym", 3_000, RecurrenceRate::Monthly, d(2024, 1, 5)),
        )
        .await
        .unwrap();

    db.execute(Statement::from_string(
        db.get_database_backend(),
        "CREATE TRIGGER lock_card_balance BEFORE UPDATE ON credit_cards \
         BEGIN SELECT RAISE(ABORT, 'card locked'); END;",
    ))
    .await
    .unwrap();

    let err = engine
        .pay_due_dates(
            ALICE,
            PayDueDates {
                credit_card_id: Some(card.id),
                ..pay(gym.id, &[d(2024, 1, 5), d(2024, 2, 5)])
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Ledger(_)));

    assert_eq!(payment_count(&db, gym.id).await, 0);
    assert_eq!(
        engine.credit_card(ALICE, card.id).await.unwrap().running_balance,
        MoneyCents::ZERO
    );

    // Cash payments never touch the card row.
    engine
        .pay_due_dates(ALICE, pay(gym.id, &[d(2024, 1, 5)]))
        .await
        .unwrap();
    assert_eq!(payment_count(&db, gym.id).await, 1);
}

#[tokio::test]
async fn automatic_payments_skip_unreadable_expenses() {
    let (engine, db) = engine_with_db().await;
    let mut broken = expense_input("Broken", 100, RecurrenceRate::Monthly, d(2024, 3, 1));
    broken.automatic_payments = true;
    let broken = engine.new_expense(ALICE, broken).await.unwrap();
    let mut water = expense_input("Water", 2_500, RecurrenceRate::Monthly, d(2024, 3, 1));
    water.automatic_payments = true;
    let water = engine.new_expense(ALICE, water).await.unwrap();

    db.execute(Statement::from_sql_and_values(
        db.get_database_backend(),
        "UPDATE expenses SET recurrence_rate = 'fortnightly' WHERE id = ?",
        vec![broken.id.as_bytes().to_vec().into()],
    ))
    .await
    .unwrap();

    let outcomes = engine
        .run_automatic_payments(ALICE, d(2024, 3, 20))
        .await
        .unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].expense_id, water.id);
    assert_eq!(outcomes[0].paid, vec![d(2024, 3, 1)]);
    assert_eq!(payment_count(&db, broken.id).await, 0);
}
