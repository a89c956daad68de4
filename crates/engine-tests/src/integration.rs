#[cfg(test)]
mod tests {
    use crate::{
        Harness, SOURCE_TABLE, TARGET_TABLE,
        utils::{assert_ledger_unique, key, keys_in, order, passthrough_job},
    };
    use connectors::{error::StoreError, store::TableCatalog};
    use engine_runtime::{ErrorKind, FixedAnswer, JobEdit, MigrationError, UndoOutcome};
    use model::{
        core::attribute::AttributeValue,
        job::{JobStatus, KeySchema},
        pagination::cursor::Cursor,
        transform::mapping::{ColumnMappings, MappingSpec},
    };
    use std::{sync::Arc, time::Duration};
    use tracing_test::traced_test;

    #[tokio::test]
    async fn copy_undo_and_copy_again() {
        let h = Harness::new(40, 15).await;
        let job = passthrough_job(&h).await;

        let summary = h.engine().run(&job.id).await.unwrap();
        assert_eq!(summary.processed_count, 40);
        let copied = h.store.items(TARGET_TABLE).await;
        assert_eq!(copied.len(), 40);
        assert!(copied.iter().all(|item| !item.contains_key("note")));

        let outcome = h.undo().undo(&job.id).await.unwrap();
        assert_eq!(
            outcome,
            UndoOutcome::Undone {
                job_id: job.id.clone(),
                deleted: 40,
                status: JobStatus::Undone,
            }
        );
        assert!(h.store.items(TARGET_TABLE).await.is_empty());
        assert_eq!(h.store.items(SOURCE_TABLE).await.len(), 40);

        let again = h.undo().undo(&job.id).await.unwrap();
        assert!(matches!(again, UndoOutcome::NothingToUndo { .. }));

        // An undone job can be run from scratch.
        let stored = h.jobs.get(&job.id).await.unwrap();
        assert_eq!(stored.processed_count, 0);
        assert!(stored.cursor.is_none());

        let summary = h.engine().run(&job.id).await.unwrap();
        assert_eq!(summary.status, JobStatus::Completed);
        assert_eq!(summary.processed_count, 40);
        assert_ledger_unique(&h, &job.id, 40).await;
    }

    #[tokio::test]
    async fn undo_removes_rekeyed_items_only() {
        let h = Harness::new(6, 10).await;
        let mut untouched = key(999);
        untouched.insert("customer".into(), AttributeValue::s("someone"));
        h.store.insert(TARGET_TABLE, [untouched.clone()]).await.unwrap();

        let mappings = ColumnMappings::new()
            .with("order_id", MappingSpec::template("{order_id}-v2"))
            .with("customer", MappingSpec::template("{customer upper}"))
            .with("schema_version", MappingSpec::literal(2i64));
        let job = h
            .jobs
            .create(SOURCE_TABLE, TARGET_TABLE, mappings)
            .await
            .unwrap();

        h.engine().run(&job.id).await.unwrap();
        let keys = keys_in(&h, TARGET_TABLE).await;
        assert_eq!(keys.len(), 7);
        assert!(keys.contains(&"o-0000-v2".to_string()));

        let ledger = h.jobs.ledger_for(&job.id).await.unwrap();
        assert!(ledger.iter().all(|k| {
            k.get("order_id")
                .and_then(|v| v.as_s())
                .is_some_and(|id| id.ends_with("-v2"))
        }));

        h.undo().undo(&job.id).await.unwrap();
        assert_eq!(h.store.items(TARGET_TABLE).await, vec![untouched]);
    }

    #[tokio::test]
    async fn creates_missing_target_from_source_schema_when_confirmed() {
        let h = Harness::without_target(15, 10).await;
        let job = passthrough_job(&h).await;

        let summary = h
            .engine()
            .with_confirm(Arc::new(FixedAnswer(true)))
            .run(&job.id)
            .await
            .unwrap();
        assert_eq!(summary.processed_count, 15);

        let created = h.store.created_tables().await;
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].table_name, TARGET_TABLE);

        let described = h.store.describe_table(TARGET_TABLE).await.unwrap();
        assert!(described.is_active());
        assert_eq!(described.key_schema(), KeySchema::new("order_id", None));
        assert_eq!(
            h.jobs.get(&job.id).await.unwrap().key_schema,
            Some(KeySchema::new("order_id", None))
        );
    }

    #[tokio::test]
    async fn declined_table_creation_fails_without_writing() {
        let h = Harness::without_target(3, 10).await;
        let job = passthrough_job(&h).await;

        let err = h.engine().run(&job.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(h.store.created_tables().await.is_empty());
        assert!(h.store.write_calls().await.is_empty());
        assert!(h.jobs.get(&job.id).await.unwrap().key_schema.is_none());
    }

    #[traced_test]
    #[tokio::test]
    async fn throttled_batches_are_resubmitted() {
        let h = Harness::new(10, 100).await;
        h.store
            .fail_next_write(StoreError::Throttled("slow down".into()))
            .await;
        h.store
            .fail_next_write(StoreError::Transient("503".into()))
            .await;
        let job = passthrough_job(&h).await;

        let summary = h.engine().run(&job.id).await.unwrap();
        assert_eq!(summary.retries, 2);
        assert_eq!(summary.batches, 1);
        assert_eq!(h.store.items(TARGET_TABLE).await.len(), 10);
        assert!(logs_contain("Resubmitting batch"));
    }

    #[tokio::test]
    async fn exhausted_retries_leave_a_resumable_error() {
        let h = Harness::new(5, 100).await;
        h.store.leave_unprocessed([1, 1, 1, 1]).await;
        let job = passthrough_job(&h).await;

        let err = h.engine().run(&job.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PartialWrite);
        assert!(matches!(err, MigrationError::Write(_)));

        let stored = h.jobs.get(&job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Error);
        assert_eq!(stored.processed_count, 0);
        assert!(h.jobs.ledger_for(&job.id).await.unwrap().is_empty());
        assert_eq!(h.store.items(TARGET_TABLE).await.len(), 4);

        let summary = h.engine().run(&job.id).await.unwrap();
        assert_eq!(summary.status, JobStatus::Completed);
        assert_eq!(h.store.items(TARGET_TABLE).await.len(), 5);
        assert_ledger_unique(&h, &job.id, 5).await;
    }

    #[tokio::test]
    async fn undo_most_recent_walks_back_through_jobs() {
        let h = Harness::new(4, 10).await;
        let first = passthrough_job(&h).await;
        h.engine().run(&first.id).await.unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = h
            .jobs
            .create(
                SOURCE_TABLE,
                TARGET_TABLE,
                ColumnMappings::new().with("order_id", MappingSpec::template("{order_id}-b")),
            )
            .await
            .unwrap();
        h.engine().run(&second.id).await.unwrap();
        assert_eq!(h.store.items(TARGET_TABLE).await.len(), 8);

        let outcome = h.undo().undo_most_recent().await.unwrap();
        assert!(matches!(outcome, UndoOutcome::Undone { ref job_id, .. } if *job_id == second.id));
        assert_eq!(h.store.items(TARGET_TABLE).await.len(), 4);

        let outcome = h.undo().undo_most_recent().await.unwrap();
        assert!(matches!(outcome, UndoOutcome::Undone { ref job_id, .. } if *job_id == first.id));
        assert!(h.store.items(TARGET_TABLE).await.is_empty());

        assert_eq!(
            h.undo().undo_most_recent().await.unwrap(),
            UndoOutcome::NothingToUndo { job_id: None }
        );
    }

    #[tokio::test]
    async fn edited_target_is_resolved_again() {
        let h = Harness::new(3, 10).await;
        h.store
            .add_table("orders_archive", KeySchema::new("order_id", None))
            .await;
        let job = passthrough_job(&h).await;
        h.engine().run(&job.id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        // Completed jobs stay completed; edit a fresh one instead.
        let mut fresh = h
            .jobs
            .create(SOURCE_TABLE, TARGET_TABLE, ColumnMappings::passthrough(["note"]))
            .await
            .unwrap();
        fresh.key_schema = Some(KeySchema::new("stale", None));
        h.state.save_job(&mut fresh).await.unwrap();

        let edited = h
            .jobs
            .edit(
                &fresh.id,
                JobEdit {
                    target_table: Some("orders_archive".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(edited.key_schema.is_none());

        h.engine().run(&fresh.id).await.unwrap();
        assert_eq!(h.store.items("orders_archive").await.len(), 3);
        assert_eq!(
            h.jobs.get(&fresh.id).await.unwrap().key_schema,
            Some(KeySchema::new("order_id", None))
        );
    }

    #[tokio::test]
    async fn table_edits_wait_for_undo_of_partial_run() {
        let h = Harness::new(30, 10).await;
        h.store
            .add_table("orders_archive", KeySchema::new("order_id", None))
            .await;
        let mut archived = order(0);
        archived.insert("customer".into(), AttributeValue::s("archived"));
        h.store
            .insert("orders_archive", [archived.clone()])
            .await
            .unwrap();
        h.store
            .fail_scan_call(2, StoreError::Validation("segment rejected".into()))
            .await;
        let job = passthrough_job(&h).await;

        h.engine().run(&job.id).await.unwrap_err();
        assert_eq!(keys_in(&h, TARGET_TABLE).await.len(), 20);

        for edit in [
            JobEdit {
                target_table: Some("orders_archive".into()),
                ..Default::default()
            },
            JobEdit {
                source_table: Some("orders_archive".into()),
                ..Default::default()
            },
        ] {
            let err = h.jobs.edit(&job.id, edit).await.unwrap_err();
            assert!(matches!(err, MigrationError::InvalidJob(_)));
            assert_eq!(err.kind(), ErrorKind::Input);
        }
        let stored = h.jobs.get(&job.id).await.unwrap();
        assert_eq!(stored.source_table, SOURCE_TABLE);
        assert_eq!(stored.target_table, TARGET_TABLE);
        assert_eq!(stored.cursor, Some(Cursor::new(key(19))));

        // Undo still deletes from the table the keys were written to.
        let outcome = h.undo().undo(&job.id).await.unwrap();
        assert!(matches!(outcome, UndoOutcome::Undone { deleted: 20, .. }));
        assert!(h.store.items(TARGET_TABLE).await.is_empty());
        assert_eq!(h.store.items("orders_archive").await, vec![archived]);

        // With the ledger gone the job may move and starts over.
        let edited = h
            .jobs
            .edit(
                &job.id,
                JobEdit {
                    target_table: Some("orders_archive".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(edited.cursor.is_none());
        assert_eq!(edited.processed_count, 0);

        let summary = h.engine().run(&job.id).await.unwrap();
        assert_eq!(summary.status, JobStatus::Completed);
        assert_eq!(summary.processed_count, 30);
        assert_eq!(keys_in(&h, "orders_archive").await.len(), 30);
        assert!(h.store.items(TARGET_TABLE).await.is_empty());
        assert_ledger_unique(&h, &job.id, 30).await;
    }

    #[tokio::test]
    async fn undo_tolerates_keys_recorded_twice() {
        let h = Harness::new(10, 10).await;
        let job = passthrough_job(&h).await;
        h.engine().run(&job.id).await.unwrap();

        // A page replayed after a crash before its checkpoint.
        h.state
            .ledger()
            .append(&job.id, &[key(0), key(1), key(2)])
            .await
            .unwrap();
        assert_eq!(h.jobs.ledger_for(&job.id).await.unwrap().len(), 13);

        let outcome = h.undo().undo(&job.id).await.unwrap();
        assert_eq!(
            outcome,
            UndoOutcome::Undone {
                job_id: job.id.clone(),
                deleted: 10,
                status: JobStatus::Undone,
            }
        );

        let deletes: Vec<_> = h
            .store
            .write_calls()
            .await
            .into_iter()
            .filter(|call| call.requests.iter().all(|r| !r.is_put()))
            .collect();
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].requests.len(), 10);
        assert!(h.store.items(TARGET_TABLE).await.is_empty());
        assert!(h.jobs.ledger_for(&job.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn forced_delete_discards_the_ledger() {
        let h = Harness::new(5, 10).await;
        let job = passthrough_job(&h).await;
        h.engine().run(&job.id).await.unwrap();

        let err = h.jobs.delete(&job.id, false).await.unwrap_err();
        assert!(matches!(err, MigrationError::InvalidJob(_)));
        assert_ledger_unique(&h, &job.id, 5).await;

        assert!(h.jobs.delete(&job.id, true).await.unwrap());
        assert!(h.jobs.ledger().await.unwrap().is_empty());
        assert_eq!(
            h.undo().undo_most_recent().await.unwrap(),
            UndoOutcome::NothingToUndo { job_id: None }
        );
        assert_eq!(h.store.items(TARGET_TABLE).await.len(), 5);
    }
}
