use std::path::Path;

use sqlx::AnyPool;
use tempfile::TempDir;

use crate::config::Config;
use crate::db::models::TaskRecord;
use crate::db::queries;
use crate::domain::codes::TaskStatus;
use crate::state::AppState;

pub fn test_config(root: &Path, db_name: &str) -> Config {
    let db_path = root.join(format!("{db_name}.db"));
    Config {
        port: 0,
        db_url: format!("sqlite://{}?mode=rwc", db_path.display()),
        token: None,
        log_level: "debug".to_string(),
        storage_dir: root.join("media"),
        max_file_size: 1024 * 1024,
        max_request_body_bytes: 4 * 1024 * 1024,
        base_url: "https://maint.example.org".to_string(),
        timezone: chrono_tz::Europe::Rome,
    }
}

pub async fn setup_db(name: &str) -> (TempDir, AnyPool) {
    let temp_dir = tempfile::tempdir().expect("temp dir should be created");
    let config = test_config(temp_dir.path(), name);
    let pool = crate::db::connect_and_migrate(&config)
        .await
        .expect("database should be ready");
    (temp_dir, pool)
}

pub async fn setup_state(name: &str) -> (TempDir, AppState) {
    let temp_dir = tempfile::tempdir().expect("temp dir should be created");
    let config = test_config(temp_dir.path(), name);
    let pool = crate::db::connect_and_migrate(&config)
        .await
        .expect("database should be ready");
    (temp_dir, AppState::new(config, pool))
}

pub async fn seed_site(pool: &AnyPool, name: &str) -> String {
    queries::create_site(
        pool,
        queries::NewSiteInput {
            name: name.to_string(),
            address: "Via Roma 1".to_string(),
            notes: String::new(),
        },
    )
    .await
    .expect("site should be created")
    .id
}

pub fn task_input(site_id: &str, title: &str) -> queries::NewTaskInput {
    queries::NewTaskInput {
        site_id: site_id.to_string(),
        title: title.to_string(),
        scheduled_for: "2024-05-10T08:00:00Z".to_string(),
        status: TaskStatus::Scheduled,
        notes: String::new(),
        plan_id: None,
        created_by: Some("tecnico".to_string()),
        template_id: None,
        asset_id: None,
    }
}

pub async fn new_task(pool: &AnyPool, site_id: &str, title: &str) -> TaskRecord {
    queries::create_task(pool, task_input(site_id, title))
        .await
        .expect("task should be created")
}
