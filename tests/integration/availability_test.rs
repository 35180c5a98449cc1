//! Availability integration tests.
//!
//! Walks a subscription through the usual lifecycle against a SQLite file.

use super::create_test_db;
use wmbs_db::wmbs::subscriptions::{self, FileState, NewSubscription};
use wmbs_db::wmbs::{available_files, files, filesets, locations, workflows, NewFile};

#[tokio::test]
async fn test_subscription_lifecycle() {
    let (db, _dir) = create_test_db().await;

    let fileset = filesets::insert(db.pool(), "/MinBias/Run2024A/RAW").await.unwrap();
    let workflow = workflows::insert(db.pool(), "rereco.pkl", "ReReco2024A", "ops")
        .await
        .unwrap();
    let sub = subscriptions::insert(db.pool(), &NewSubscription::new(fileset, workflow, "Processing"))
        .await
        .unwrap();

    let cern = locations::insert(db.pool(), "se.cern.ch").await.unwrap();
    let fnal = locations::insert(db.pool(), "se.fnal.gov").await.unwrap();

    let mut ids = Vec::new();
    for (i, sites) in [vec![cern], vec![cern, fnal], vec![fnal]].into_iter().enumerate() {
        let lfn = format!("/store/data/Run2024A/MinBias/RAW/file{i}.root");
        let file = files::insert(db.pool(), &NewFile::new(lfn).with_size(2_000_000, 500))
            .await
            .unwrap();
        for site in sites {
            files::add_location(db.pool(), file, site).await.unwrap();
        }
        ids.push(file);
    }

    let mut conn = db.acquire().await.unwrap();
    filesets::add_files(&mut conn, fileset, &ids).await.unwrap();

    let available = available_files(&mut conn, sub).await.unwrap();
    assert_eq!(available.len(), 3);
    assert_eq!(available[1].locations, vec!["se.cern.ch", "se.fnal.gov"]);

    // Acquire everything that is available in one transaction.
    let acquired: Vec<i64> = available.iter().map(|f| f.file).collect();
    drop(conn);
    let mut tx = db.begin().await.unwrap();
    subscriptions::mark_acquired(&mut tx, sub, &acquired).await.unwrap();
    tx.commit().await.unwrap();

    let mut conn = db.acquire().await.unwrap();
    assert!(available_files(&mut conn, sub).await.unwrap().is_empty());

    // One job succeeds, one fails, one is handed back.
    subscriptions::mark_complete(&mut conn, sub, &[ids[0]]).await.unwrap();
    subscriptions::mark_failed(&mut conn, sub, &[ids[1]]).await.unwrap();
    subscriptions::release(&mut conn, sub, &[ids[2]]).await.unwrap();

    let available = available_files(&mut conn, sub).await.unwrap();
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].file, ids[2]);
    assert_eq!(available[0].locations, vec!["se.fnal.gov"]);

    assert_eq!(
        subscriptions::files_in_state(&mut *conn, sub, FileState::Acquired)
            .await
            .unwrap(),
        Vec::<i64>::new()
    );

    drop(conn);
    db.close().await;
}

#[tokio::test]
async fn test_site_lists_against_file_database() {
    let (db, _dir) = create_test_db().await;

    let fileset = filesets::insert(db.pool(), "fs").await.unwrap();
    let workflow = workflows::insert(db.pool(), "s", "w", "o").await.unwrap();
    let sub = subscriptions::insert(db.pool(), &NewSubscription::new(fileset, workflow, "Processing"))
        .await
        .unwrap();

    let mut conn = db.acquire().await.unwrap();
    let mut ids = Vec::new();
    for (lfn, site) in [("/a", "T1_US_FNAL"), ("/b", "T2_CH_CERN"), ("/c", "T2_DE_DESY")] {
        let file = files::insert(&mut *conn, &NewFile::new(lfn)).await.unwrap();
        let location = locations::insert(&mut *conn, site).await.unwrap();
        files::add_location(&mut *conn, file, location).await.unwrap();
        ids.push(file);
    }
    filesets::add_files(&mut conn, fileset, &ids).await.unwrap();

    subscriptions::add_black_list(&mut conn, sub, &["T2_DE_DESY"])
        .await
        .unwrap();
    let visible: Vec<i64> = available_files(&mut conn, sub)
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.file)
        .collect();
    assert_eq!(visible, vec![ids[0], ids[1]]);

    subscriptions::add_white_list(&mut conn, sub, &["T2_CH_CERN"])
        .await
        .unwrap();
    let visible: Vec<i64> = available_files(&mut conn, sub)
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.file)
        .collect();
    assert_eq!(visible, vec![ids[1]]);

    subscriptions::clear_site_list(&mut *conn, sub).await.unwrap();
    assert_eq!(available_files(&mut conn, sub).await.unwrap().len(), 3);

    drop(conn);
    db.close().await;
}

#[tokio::test]
async fn test_deleting_a_file_cascades() {
    let (db, _dir) = create_test_db().await;

    let fileset = filesets::insert(db.pool(), "fs").await.unwrap();
    let workflow = workflows::insert(db.pool(), "s", "w", "o").await.unwrap();
    let sub = subscriptions::insert(db.pool(), &NewSubscription::new(fileset, workflow, "Processing"))
        .await
        .unwrap();

    let file = files::insert(db.pool(), &NewFile::new("/gone")).await.unwrap();
    let location = locations::insert(db.pool(), "se.cern.ch").await.unwrap();
    files::add_location(db.pool(), file, location).await.unwrap();

    let mut conn = db.acquire().await.unwrap();
    filesets::add_files(&mut conn, fileset, &[file]).await.unwrap();
    subscriptions::mark_acquired(&mut conn, sub, &[file]).await.unwrap();

    sqlx::query("DELETE FROM wmbs_file_details WHERE id = $1")
        .bind(file)
        .execute(&mut *conn)
        .await
        .unwrap();

    assert!(filesets::files(&mut *conn, fileset).await.unwrap().is_empty());
    assert!(
        subscriptions::files_in_state(&mut *conn, sub, FileState::Acquired)
            .await
            .unwrap()
            .is_empty()
    );

    drop(conn);
    db.close().await;
}
