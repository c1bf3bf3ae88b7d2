use sqlx::query_builder::QueryBuilder;
use sqlx::{Any, AnyPool, Transaction};
use uuid::Uuid;

use crate::db::models::{
    AssetChecklistEntry, AssetOverview, AssetRecord, ChecklistItem, ChecklistItemRecord,
    Dashboard, PlanRecord, SiteDetails, SiteRecord, SiteSummary, TaskDetails, TaskRecord,
    TaskStats, TemplateDetails, TemplateItemRecord, TemplateRecord,
};
use crate::domain::checklist::ChecklistAnswer;
use crate::domain::codes::{AssetStatus, ItemType, PlanFrequency, TaskStatus};
use crate::domain::lifecycle;
use crate::domain::time::now_timestamp;
use crate::domain::token::AssetToken;
use crate::error::{AppError, AppResult};

const SITE_SUMMARY_SELECT: &str = r#"
    SELECT
        s.id,
        s.name,
        s.address,
        s.notes,
        s.created_at,
        (SELECT COUNT(*) FROM assets a WHERE a.site_id = s.id) AS asset_count,
        (
            SELECT COUNT(*)
            FROM maintenance_tasks t
            WHERE t.site_id = s.id AND t.status IN ('scheduled', 'in_progress')
        ) AS open_task_count
    FROM sites s
"#;

const ASSET_SELECT: &str = r#"
    SELECT
        a.id,
        a.site_id,
        s.name AS site_name,
        a.name,
        a.asset_type,
        a.serial,
        a.vendor,
        a.purchase_date,
        a.status,
        a.qr_token,
        a.created_at
    FROM assets a
    INNER JOIN sites s ON s.id = a.site_id
"#;

const PLAN_SELECT: &str = r#"
    SELECT id, site_id, title, frequency, next_due, active, assigned_to, created_at
    FROM maintenance_plans
"#;

const TASK_SELECT: &str = r#"
    SELECT
        t.id,
        t.site_id,
        s.name AS site_name,
        t.plan_id,
        t.title,
        t.scheduled_for,
        t.status,
        t.notes,
        t.report_key,
        t.completed_at,
        t.created_by,
        t.created_at
    FROM maintenance_tasks t
    INNER JOIN sites s ON s.id = t.site_id
"#;

const TEMPLATE_SELECT: &str = r#"
    SELECT ct.id, ct.site_id, s.name AS site_name, ct.name, ct.created_at
    FROM checklist_templates ct
    LEFT JOIN sites s ON s.id = ct.site_id
"#;

const TEMPLATE_ITEM_SELECT: &str = r#"
    SELECT id, template_id, seq, position, label, item_type, required, unit
    FROM checklist_template_items
"#;

const CHECKLIST_ITEM_SELECT: &str = r#"
    SELECT
        c.id,
        c.task_id,
        c.seq,
        c.asset_id,
        a.name AS asset_name,
        c.template_item_id,
        c.label_snapshot,
        c.item_type,
        c.required,
        c.unit,
        c.value_text,
        c.value_number,
        c.value_bool,
        c.attachment_key,
        c.attachment_filename,
        c.attachment_content_type
    FROM task_checklist_items c
    LEFT JOIN assets a ON a.id = c.asset_id
"#;

#[derive(Debug, Clone)]
pub struct NewSiteInput {
    pub name: String,
    pub address: String,
    pub notes: String,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateSiteInput {
    pub name: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AssetFilters {
    pub status: Option<String>,
    pub site_id: Option<String>,
    pub query: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewAssetInput {
    pub site_id: String,
    pub name: String,
    pub asset_type: String,
    pub serial: String,
    pub vendor: String,
    pub purchase_date: Option<String>,
    pub status: AssetStatus,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateAssetInput {
    pub name: Option<String>,
    pub asset_type: Option<String>,
    pub serial: Option<String>,
    pub vendor: Option<String>,
    /// `Some(None)` clears the date.
    pub purchase_date: Option<Option<String>>,
    pub status: Option<AssetStatus>,
}

#[derive(Debug, Clone)]
pub struct NewPlanInput {
    pub site_id: String,
    pub title: String,
    pub frequency: PlanFrequency,
    pub next_due: Option<String>,
    pub active: bool,
    pub assigned_to: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdatePlanInput {
    pub title: Option<String>,
    pub frequency: Option<PlanFrequency>,
    pub next_due: Option<Option<String>>,
    pub active: Option<bool>,
    pub assigned_to: Option<Option<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilters {
    pub status: Option<String>,
    pub site_id: Option<String>,
    pub query: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewTaskInput {
    pub site_id: String,
    pub title: String,
    pub scheduled_for: String,
    pub status: TaskStatus,
    pub notes: String,
    pub plan_id: Option<String>,
    pub created_by: Option<String>,
    pub template_id: Option<String>,
    pub asset_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateTaskInput {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub scheduled_for: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewTemplateInput {
    pub name: String,
    pub site_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TemplateItemInput {
    pub label: String,
    pub item_type: ItemType,
    pub required: bool,
    pub unit: String,
    pub position: i64,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateTemplateItemInput {
    pub label: Option<String>,
    pub item_type: Option<ItemType>,
    pub required: Option<bool>,
    pub unit: Option<String>,
    pub position: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct AdhocItemInput {
    pub label: String,
    pub item_type: ItemType,
    pub required: bool,
    pub unit: String,
    pub asset_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AnswerUpdate {
    pub item_id: String,
    pub answer: ChecklistAnswer,
}

/// Final task state written together with the closing answer batch.
#[derive(Debug, Clone)]
pub struct TaskClosure {
    pub status: TaskStatus,
    pub completed_at: Option<String>,
    pub report_key: String,
}

/// Case-insensitive substring pattern with LIKE wildcards escaped.
pub fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for character in query.trim().to_lowercase().chars() {
        if matches!(character, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(character);
    }
    escaped.push('%');
    escaped
}

fn required_text(value: &str, what: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(format!("{what} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

// Sites

pub async fn list_sites(pool: &AnyPool, query: Option<&str>) -> AppResult<Vec<SiteSummary>> {
    let mut builder = QueryBuilder::<Any>::new(SITE_SUMMARY_SELECT);

    if let Some(query) = non_empty(query) {
        let pattern = like_pattern(&query);
        builder.push(r" WHERE (LOWER(s.name) LIKE ");
        builder.push_bind(pattern.clone());
        builder.push(r" ESCAPE '\' OR LOWER(s.address) LIKE ");
        builder.push_bind(pattern);
        builder.push(r" ESCAPE '\')");
    }

    builder.push(" ORDER BY s.name ASC");
    let sites = builder.build_query_as::<SiteSummary>().fetch_all(pool).await?;
    Ok(sites)
}

pub async fn create_site(pool: &AnyPool, input: NewSiteInput) -> AppResult<SiteRecord> {
    let name = required_text(&input.name, "site name")?;
    let site_id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO sites (id, name, address, notes, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&site_id)
    .bind(&name)
    .bind(input.address.trim())
    .bind(input.notes.trim())
    .bind(now_timestamp())
    .execute(pool)
    .await?;

    get_site(pool, &site_id).await
}

pub async fn get_site(pool: &AnyPool, site_id: &str) -> AppResult<SiteRecord> {
    let site = sqlx::query_as::<Any, SiteRecord>(
        "SELECT id, name, address, notes, created_at FROM sites WHERE id = ?",
    )
    .bind(site_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("site", site_id))?;

    Ok(site)
}

pub async fn get_site_details(pool: &AnyPool, site_id: &str) -> AppResult<SiteDetails> {
    let site = get_site(pool, site_id).await?;

    let assets = list_assets(
        pool,
        AssetFilters {
            site_id: Some(site.id.clone()),
            ..AssetFilters::default()
        },
    )
    .await?;

    let mut open = QueryBuilder::<Any>::new(TASK_SELECT);
    open.push(" WHERE t.site_id = ");
    open.push_bind(site.id.clone());
    open.push(" AND t.status NOT IN ('done', 'cancelled') ORDER BY t.scheduled_for ASC");
    let open_tasks = open.build_query_as::<TaskRecord>().fetch_all(pool).await?;

    let mut done = QueryBuilder::<Any>::new(TASK_SELECT);
    done.push(" WHERE t.site_id = ");
    done.push_bind(site.id.clone());
    done.push(" AND t.status = 'done' ORDER BY t.scheduled_for DESC LIMIT 3");
    let recent_done_tasks = done.build_query_as::<TaskRecord>().fetch_all(pool).await?;

    Ok(SiteDetails {
        site,
        assets,
        open_tasks,
        recent_done_tasks,
    })
}

pub async fn update_site(
    pool: &AnyPool,
    site_id: &str,
    input: UpdateSiteInput,
) -> AppResult<SiteRecord> {
    let existing = get_site(pool, site_id).await?;

    let name = match input.name {
        Some(name) => required_text(&name, "site name")?,
        None => existing.name,
    };
    let address = input
        .address
        .map(|value| value.trim().to_string())
        .unwrap_or(existing.address);
    let notes = input
        .notes
        .map(|value| value.trim().to_string())
        .unwrap_or(existing.notes);

    sqlx::query("UPDATE sites SET name = ?, address = ?, notes = ? WHERE id = ?")
        .bind(&name)
        .bind(&address)
        .bind(&notes)
        .bind(site_id)
        .execute(pool)
        .await?;

    get_site(pool, site_id).await
}

/// Deletes a site with its assets, plans and tasks. Returns the storage keys
/// of files that belonged to the removed tasks.
pub async fn delete_site(pool: &AnyPool, site_id: &str) -> AppResult<Vec<String>> {
    let mut tx = pool.begin().await?;

    let report_keys: Vec<Option<String>> =
        sqlx::query_scalar("SELECT report_key FROM maintenance_tasks WHERE site_id = ?")
            .bind(site_id)
            .fetch_all(&mut *tx)
            .await?;

    let attachment_keys: Vec<Option<String>> = sqlx::query_scalar(
        r#"
        SELECT c.attachment_key
        FROM task_checklist_items c
        INNER JOIN maintenance_tasks t ON t.id = c.task_id
        WHERE t.site_id = ?
        "#,
    )
    .bind(site_id)
    .fetch_all(&mut *tx)
    .await?;

    let result = sqlx::query("DELETE FROM sites WHERE id = ?")
        .bind(site_id)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("site", site_id));
    }

    tx.commit().await?;

    Ok(report_keys
        .into_iter()
        .chain(attachment_keys)
        .flatten()
        .collect())
}

// Assets

pub async fn list_assets(pool: &AnyPool, filters: AssetFilters) -> AppResult<Vec<AssetRecord>> {
    let mut builder = QueryBuilder::<Any>::new(ASSET_SELECT);
    builder.push(" WHERE 1 = 1");

    if let Some(status) = non_empty(filters.status.as_deref()) {
        builder.push(" AND a.status = ");
        builder.push_bind(status);
    }

    if let Some(site_id) = non_empty(filters.site_id.as_deref()) {
        builder.push(" AND a.site_id = ");
        builder.push_bind(site_id);
    }

    if let Some(query) = non_empty(filters.query.as_deref()) {
        let pattern = like_pattern(&query);
        let columns = ["a.name", "a.asset_type", "a.serial", "s.name", "a.vendor"];
        builder.push(" AND (");
        for (index, column) in columns.iter().enumerate() {
            if index > 0 {
                builder.push(" OR ");
            }
            builder.push(format!("LOWER({column}) LIKE "));
            builder.push_bind(pattern.clone());
            builder.push(r" ESCAPE '\'");
        }
        builder.push(")");
    }

    builder.push(" ORDER BY a.name ASC, a.created_at ASC");
    let assets = builder.build_query_as::<AssetRecord>().fetch_all(pool).await?;
    Ok(assets)
}

pub async fn create_asset(pool: &AnyPool, input: NewAssetInput) -> AppResult<AssetRecord> {
    let name = required_text(&input.name, "asset name")?;
    get_site(pool, &input.site_id).await?;

    let asset_id = Uuid::new_v4().to_string();
    let token = AssetToken::generate();

    sqlx::query(
        r#"
        INSERT INTO assets (
            id,
            site_id,
            name,
            asset_type,
            serial,
            vendor,
            purchase_date,
            status,
            qr_token,
            created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&asset_id)
    .bind(&input.site_id)
    .bind(&name)
    .bind(input.asset_type.trim())
    .bind(input.serial.trim())
    .bind(input.vendor.trim())
    .bind(input.purchase_date)
    .bind(input.status.as_str())
    .bind(token.as_stored())
    .bind(now_timestamp())
    .execute(pool)
    .await?;

    get_asset(pool, &asset_id).await
}

pub async fn get_asset(pool: &AnyPool, asset_id: &str) -> AppResult<AssetRecord> {
    let mut builder = QueryBuilder::<Any>::new(ASSET_SELECT);
    builder.push(" WHERE a.id = ");
    builder.push_bind(asset_id);

    let asset = builder
        .build_query_as::<AssetRecord>()
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("asset", asset_id))?;

    Ok(asset)
}

/// Exact token match only; malformed tokens are simply not found.
pub async fn get_asset_by_token(pool: &AnyPool, token: &str) -> AppResult<AssetRecord> {
    let parsed = AssetToken::parse(token)
        .ok_or_else(|| AppError::NotFound("asset not found".to_string()))?;

    let mut builder = QueryBuilder::<Any>::new(ASSET_SELECT);
    builder.push(" WHERE a.qr_token = ");
    builder.push_bind(parsed.as_stored());

    let asset = builder
        .build_query_as::<AssetRecord>()
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("asset not found".to_string()))?;

    Ok(asset)
}

pub async fn get_asset_overview(pool: &AnyPool, token: &str) -> AppResult<AssetOverview> {
    let asset = get_asset_by_token(pool, token).await?;

    let mut related = QueryBuilder::<Any>::new(TASK_SELECT);
    related.push(
        r#"
        WHERE EXISTS (
            SELECT 1
            FROM task_checklist_items c
            WHERE c.task_id = t.id AND c.asset_id =
        "#,
    );
    related.push_bind(asset.id.clone());
    related.push(") ORDER BY t.scheduled_for DESC LIMIT 8");
    let mut tasks = related.build_query_as::<TaskRecord>().fetch_all(pool).await?;

    if tasks.is_empty() {
        let mut at_site = QueryBuilder::<Any>::new(TASK_SELECT);
        at_site.push(" WHERE t.site_id = ");
        at_site.push_bind(asset.site_id.clone());
        at_site.push(" ORDER BY t.scheduled_for DESC LIMIT 6");
        tasks = at_site.build_query_as::<TaskRecord>().fetch_all(pool).await?;
    }

    let checklist_items = sqlx::query_as::<Any, AssetChecklistEntry>(
        r#"
        SELECT c.id, c.task_id, t.title AS task_title, c.label_snapshot, c.item_type
        FROM task_checklist_items c
        INNER JOIN maintenance_tasks t ON t.id = c.task_id
        WHERE c.asset_id = ?
        ORDER BY t.created_at DESC, c.seq DESC
        LIMIT 6
        "#,
    )
    .bind(&asset.id)
    .fetch_all(pool)
    .await?;

    Ok(AssetOverview {
        asset,
        tasks,
        checklist_items,
    })
}

pub async fn update_asset(
    pool: &AnyPool,
    asset_id: &str,
    input: UpdateAssetInput,
) -> AppResult<AssetRecord> {
    let existing = get_asset(pool, asset_id).await?;

    let name = match input.name {
        Some(name) => required_text(&name, "asset name")?,
        None => existing.name,
    };
    let asset_type = input
        .asset_type
        .map(|value| value.trim().to_string())
        .unwrap_or(existing.asset_type);
    let serial = input
        .serial
        .map(|value| value.trim().to_string())
        .unwrap_or(existing.serial);
    let vendor = input
        .vendor
        .map(|value| value.trim().to_string())
        .unwrap_or(existing.vendor);
    let purchase_date = input.purchase_date.unwrap_or(existing.purchase_date);
    let status = input
        .status
        .map(|status| status.as_str().to_string())
        .unwrap_or(existing.status);

    sqlx::query(
        r#"
        UPDATE assets
        SET name = ?, asset_type = ?, serial = ?, vendor = ?, purchase_date = ?, status = ?
        WHERE id = ?
        "#,
    )
    .bind(&name)
    .bind(&asset_type)
    .bind(&serial)
    .bind(&vendor)
    .bind(purchase_date)
    .bind(&status)
    .bind(asset_id)
    .execute(pool)
    .await?;

    get_asset(pool, asset_id).await
}

pub async fn delete_asset(pool: &AnyPool, asset_id: &str) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM assets WHERE id = ?")
        .bind(asset_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("asset", asset_id));
    }

    Ok(())
}

// Plans

pub async fn list_plans(pool: &AnyPool, site_id: Option<&str>) -> AppResult<Vec<PlanRecord>> {
    let mut builder = QueryBuilder::<Any>::new(PLAN_SELECT);
    if let Some(site_id) = non_empty(site_id) {
        builder.push(" WHERE site_id = ");
        builder.push_bind(site_id);
    }
    builder.push(" ORDER BY title ASC");

    let plans = builder.build_query_as::<PlanRecord>().fetch_all(pool).await?;
    Ok(plans)
}

pub async fn create_plan(pool: &AnyPool, input: NewPlanInput) -> AppResult<PlanRecord> {
    let title = required_text(&input.title, "plan title")?;
    get_site(pool, &input.site_id).await?;
    let plan_id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO maintenance_plans (id, site_id, title, frequency, next_due, active, assigned_to, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&plan_id)
    .bind(&input.site_id)
    .bind(&title)
    .bind(input.frequency.as_str())
    .bind(input.next_due)
    .bind(i64::from(input.active))
    .bind(input.assigned_to)
    .bind(now_timestamp())
    .execute(pool)
    .await?;

    get_plan(pool, &plan_id).await
}

pub async fn get_plan(pool: &AnyPool, plan_id: &str) -> AppResult<PlanRecord> {
    let mut builder = QueryBuilder::<Any>::new(PLAN_SELECT);
    builder.push(" WHERE id = ");
    builder.push_bind(plan_id);

    let plan = builder
        .build_query_as::<PlanRecord>()
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("plan", plan_id))?;

    Ok(plan)
}

pub async fn update_plan(
    pool: &AnyPool,
    plan_id: &str,
    input: UpdatePlanInput,
) -> AppResult<PlanRecord> {
    let existing = get_plan(pool, plan_id).await?;

    let title = match input.title {
        Some(title) => required_text(&title, "plan title")?,
        None => existing.title,
    };
    let frequency = input
        .frequency
        .map(|frequency| frequency.as_str().to_string())
        .unwrap_or(existing.frequency);
    let next_due = input.next_due.unwrap_or(existing.next_due);
    let active = input.active.map(i64::from).unwrap_or(existing.active);
    let assigned_to = input.assigned_to.unwrap_or(existing.assigned_to);

    sqlx::query(
        r#"
        UPDATE maintenance_plans
        SET title = ?, frequency = ?, next_due = ?, active = ?, assigned_to = ?
        WHERE id = ?
        "#,
    )
    .bind(&title)
    .bind(&frequency)
    .bind(next_due)
    .bind(active)
    .bind(assigned_to)
    .bind(plan_id)
    .execute(pool)
    .await?;

    get_plan(pool, plan_id).await
}

pub async fn delete_plan(pool: &AnyPool, plan_id: &str) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM maintenance_plans WHERE id = ?")
        .bind(plan_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("plan", plan_id));
    }

    Ok(())
}

// Checklist templates

/// With a site, returns what a task at that site may use: its own templates
/// plus the global ones.
pub async fn list_templates(
    pool: &AnyPool,
    site_id: Option<&str>,
) -> AppResult<Vec<TemplateRecord>> {
    let mut builder = QueryBuilder::<Any>::new(TEMPLATE_SELECT);
    if let Some(site_id) = non_empty(site_id) {
        builder.push(" WHERE ct.site_id IS NULL OR ct.site_id = ");
        builder.push_bind(site_id);
    }
    builder.push(" ORDER BY ct.name ASC, ct.created_at ASC");

    let templates = builder
        .build_query_as::<TemplateRecord>()
        .fetch_all(pool)
        .await?;
    Ok(templates)
}

pub async fn create_template(pool: &AnyPool, input: NewTemplateInput) -> AppResult<TemplateRecord> {
    let name = required_text(&input.name, "template name")?;
    let site_id = non_empty(input.site_id.as_deref());
    if let Some(site_id) = site_id.as_deref() {
        get_site(pool, site_id).await?;
    }

    let template_id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO checklist_templates (id, site_id, name, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&template_id)
    .bind(site_id)
    .bind(&name)
    .bind(now_timestamp())
    .execute(pool)
    .await?;

    get_template(pool, &template_id).await
}

pub async fn get_template(pool: &AnyPool, template_id: &str) -> AppResult<TemplateRecord> {
    let mut builder = QueryBuilder::<Any>::new(TEMPLATE_SELECT);
    builder.push(" WHERE ct.id = ");
    builder.push_bind(template_id);

    let template = builder
        .build_query_as::<TemplateRecord>()
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("checklist template", template_id))?;

    Ok(template)
}

pub async fn get_template_details(pool: &AnyPool, template_id: &str) -> AppResult<TemplateDetails> {
    let template = get_template(pool, template_id).await?;
    let items = template_items(pool, template_id).await?;
    Ok(TemplateDetails { template, items })
}

pub async fn template_items(pool: &AnyPool, template_id: &str) -> AppResult<Vec<TemplateItemRecord>> {
    let mut builder = QueryBuilder::<Any>::new(TEMPLATE_ITEM_SELECT);
    builder.push(" WHERE template_id = ");
    builder.push_bind(template_id);
    builder.push(" ORDER BY position ASC, seq ASC");

    let items = builder
        .build_query_as::<TemplateItemRecord>()
        .fetch_all(pool)
        .await?;
    Ok(items)
}

pub async fn delete_template(pool: &AnyPool, template_id: &str) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM checklist_templates WHERE id = ?")
        .bind(template_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("checklist template", template_id));
    }

    Ok(())
}

pub async fn add_template_item(
    pool: &AnyPool,
    template_id: &str,
    input: TemplateItemInput,
) -> AppResult<TemplateItemRecord> {
    let label = required_text(&input.label, "item label")?;
    let item_id = Uuid::new_v4().to_string();

    let mut tx = pool.begin().await?;

    let exists: Option<String> =
        sqlx::query_scalar("SELECT id FROM checklist_templates WHERE id = ?")
            .bind(template_id)
            .fetch_optional(&mut *tx)
            .await?;
    if exists.is_none() {
        return Err(AppError::not_found("checklist template", template_id));
    }

    let seq: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(seq), 0) + 1 FROM checklist_template_items WHERE template_id = ?",
    )
    .bind(template_id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO checklist_template_items (id, template_id, seq, position, label, item_type, required, unit)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&item_id)
    .bind(template_id)
    .bind(seq)
    .bind(input.position.max(0))
    .bind(&label)
    .bind(input.item_type.as_str())
    .bind(i64::from(input.required))
    .bind(input.unit.trim())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    get_template_item(pool, template_id, &item_id).await
}

pub async fn update_template_item(
    pool: &AnyPool,
    template_id: &str,
    item_id: &str,
    input: UpdateTemplateItemInput,
) -> AppResult<TemplateItemRecord> {
    let existing = get_template_item(pool, template_id, item_id).await?;

    let label = match input.label {
        Some(label) => required_text(&label, "item label")?,
        None => existing.label,
    };
    let item_type = input
        .item_type
        .map(|item_type| item_type.as_str().to_string())
        .unwrap_or(existing.item_type);
    let required = input.required.map(i64::from).unwrap_or(existing.required);
    let unit = input
        .unit
        .map(|unit| unit.trim().to_string())
        .unwrap_or(existing.unit);
    let position = input.position.map(|value| value.max(0)).unwrap_or(existing.position);

    sqlx::query(
        r#"
        UPDATE checklist_template_items
        SET label = ?, item_type = ?, required = ?, unit = ?, position = ?
        WHERE id = ? AND template_id = ?
        "#,
    )
    .bind(&label)
    .bind(&item_type)
    .bind(required)
    .bind(&unit)
    .bind(position)
    .bind(item_id)
    .bind(template_id)
    .execute(pool)
    .await?;

    get_template_item(pool, template_id, item_id).await
}

pub async fn delete_template_item(pool: &AnyPool, template_id: &str, item_id: &str) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM checklist_template_items WHERE id = ? AND template_id = ?")
        .bind(item_id)
        .bind(template_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("checklist template item", item_id));
    }

    Ok(())
}

async fn get_template_item(
    pool: &AnyPool,
    template_id: &str,
    item_id: &str,
) -> AppResult<TemplateItemRecord> {
    let mut builder = QueryBuilder::<Any>::new(TEMPLATE_ITEM_SELECT);
    builder.push(" WHERE id = ");
    builder.push_bind(item_id);
    builder.push(" AND template_id = ");
    builder.push_bind(template_id);

    let item = builder
        .build_query_as::<TemplateItemRecord>()
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("checklist template item", item_id))?;

    Ok(item)
}

// Tasks

pub async fn list_tasks(pool: &AnyPool, filters: TaskFilters) -> AppResult<Vec<TaskRecord>> {
    let mut builder = QueryBuilder::<Any>::new(TASK_SELECT);
    builder.push(" WHERE 1 = 1");

    if let Some(status) = non_empty(filters.status.as_deref()) {
        builder.push(" AND t.status = ");
        builder.push_bind(status);
    }

    if let Some(site_id) = non_empty(filters.site_id.as_deref()) {
        builder.push(" AND t.site_id = ");
        builder.push_bind(site_id);
    }

    if let Some(query) = non_empty(filters.query.as_deref()) {
        let pattern = like_pattern(&query);
        builder.push(" AND (LOWER(t.title) LIKE ");
        builder.push_bind(pattern.clone());
        builder.push(r" ESCAPE '\' OR LOWER(t.notes) LIKE ");
        builder.push_bind(pattern);
        builder.push(r" ESCAPE '\')");
    }

    builder.push(" ORDER BY t.scheduled_for DESC, t.created_at DESC");
    let tasks = builder.build_query_as::<TaskRecord>().fetch_all(pool).await?;
    Ok(tasks)
}

/// Creates a task and, when a template is given, its checklist in the same
/// transaction. A template scoped to another site rejects the whole creation.
pub async fn create_task(pool: &AnyPool, input: NewTaskInput) -> AppResult<TaskRecord> {
    let title = required_text(&input.title, "task title")?;
    let task_id = Uuid::new_v4().to_string();

    let mut tx = pool.begin().await?;

    let site_exists: Option<String> = sqlx::query_scalar("SELECT id FROM sites WHERE id = ?")
        .bind(&input.site_id)
        .fetch_optional(&mut *tx)
        .await?;
    if site_exists.is_none() {
        return Err(AppError::not_found("site", &input.site_id));
    }

    let plan_id = match non_empty(input.plan_id.as_deref()) {
        Some(plan_id) => {
            sqlx::query_scalar::<Any, String>(
                "SELECT id FROM maintenance_plans WHERE id = ? AND site_id = ?",
            )
            .bind(&plan_id)
            .bind(&input.site_id)
            .fetch_optional(&mut *tx)
            .await?
        }
        None => None,
    };

    let template_items = match non_empty(input.template_id.as_deref()) {
        Some(template_id) => Some(
            scoped_template_items(&mut tx, &template_id, &input.site_id).await?,
        ),
        None => None,
    };

    sqlx::query(
        r#"
        INSERT INTO maintenance_tasks (
            id,
            site_id,
            plan_id,
            title,
            scheduled_for,
            status,
            notes,
            report_key,
            completed_at,
            created_by,
            created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, NULL, ?, ?, ?)
        "#,
    )
    .bind(&task_id)
    .bind(&input.site_id)
    .bind(plan_id)
    .bind(&title)
    .bind(&input.scheduled_for)
    .bind(input.status.as_str())
    .bind(input.notes.trim())
    .bind(
        (input.status == TaskStatus::Done).then(now_timestamp),
    )
    .bind(non_empty(input.created_by.as_deref()))
    .bind(now_timestamp())
    .execute(&mut *tx)
    .await?;

    if let Some(items) = template_items {
        let asset_id = asset_at_site(&mut tx, input.asset_id.as_deref(), &input.site_id).await?;
        insert_snapshots(&mut tx, &task_id, &items, asset_id.as_deref()).await?;
    }

    tx.commit().await?;
    get_task(pool, &task_id).await
}

pub async fn get_task(pool: &AnyPool, task_id: &str) -> AppResult<TaskRecord> {
    let mut builder = QueryBuilder::<Any>::new(TASK_SELECT);
    builder.push(" WHERE t.id = ");
    builder.push_bind(task_id);

    let task = builder
        .build_query_as::<TaskRecord>()
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("task", task_id))?;

    Ok(task)
}

pub async fn get_task_details(pool: &AnyPool, task_id: &str) -> AppResult<TaskDetails> {
    let task = get_task(pool, task_id).await?;
    let items = list_checklist_items(pool, &task.id)
        .await?
        .into_iter()
        .map(ChecklistItem::from)
        .collect();

    let mut related = QueryBuilder::<Any>::new(ASSET_SELECT);
    related.push(" WHERE a.id IN (SELECT c.asset_id FROM task_checklist_items c WHERE c.task_id = ");
    related.push_bind(task.id.clone());
    related.push(") ORDER BY a.name ASC");
    let related_assets = related
        .build_query_as::<AssetRecord>()
        .fetch_all(pool)
        .await?;

    let available_templates = list_templates(pool, Some(&task.site_id)).await?;
    let site_assets = list_assets(
        pool,
        AssetFilters {
            site_id: Some(task.site_id.clone()),
            ..AssetFilters::default()
        },
    )
    .await?;

    Ok(TaskDetails {
        task,
        items,
        related_assets,
        available_templates,
        site_assets,
    })
}

pub async fn update_task(
    pool: &AnyPool,
    task_id: &str,
    input: UpdateTaskInput,
) -> AppResult<TaskRecord> {
    let existing = get_task(pool, task_id).await?;

    let title = match input.title {
        Some(title) => required_text(&title, "task title")?,
        None => existing.title,
    };
    let notes = input
        .notes
        .map(|notes| notes.trim().to_string())
        .unwrap_or(existing.notes);
    let scheduled_for = input.scheduled_for.unwrap_or(existing.scheduled_for);

    sqlx::query("UPDATE maintenance_tasks SET title = ?, notes = ?, scheduled_for = ? WHERE id = ?")
        .bind(&title)
        .bind(&notes)
        .bind(&scheduled_for)
        .bind(task_id)
        .execute(pool)
        .await?;

    get_task(pool, task_id).await
}

/// Deletes a task with its checklist. Returns the storage keys of its report
/// and photo attachments.
pub async fn delete_task(pool: &AnyPool, task_id: &str) -> AppResult<Vec<String>> {
    let mut tx = pool.begin().await?;

    let report_key: Option<Option<String>> =
        sqlx::query_scalar("SELECT report_key FROM maintenance_tasks WHERE id = ?")
            .bind(task_id)
            .fetch_optional(&mut *tx)
            .await?;
    let Some(report_key) = report_key else {
        return Err(AppError::not_found("task", task_id));
    };

    let attachment_keys: Vec<Option<String>> =
        sqlx::query_scalar("SELECT attachment_key FROM task_checklist_items WHERE task_id = ?")
            .bind(task_id)
            .fetch_all(&mut *tx)
            .await?;

    sqlx::query("DELETE FROM maintenance_tasks WHERE id = ?")
        .bind(task_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(report_key
        .into_iter()
        .chain(attachment_keys.into_iter().flatten())
        .collect())
}

/// Applies a raw status-update request. Unknown status codes leave the task as it is.
pub async fn update_task_status(pool: &AnyPool, task_id: &str, value: &str) -> AppResult<TaskRecord> {
    let task = get_task(pool, task_id).await?;

    let Some(target) = lifecycle::requested_status(value) else {
        tracing::debug!(task_id, status = value, "ignoring unknown task status");
        return Ok(task);
    };

    let change = lifecycle::transition(
        task.current_status(),
        task.completed_at.as_deref(),
        target,
        &now_timestamp(),
    );

    sqlx::query("UPDATE maintenance_tasks SET status = ?, completed_at = ? WHERE id = ?")
        .bind(change.status.as_str())
        .bind(change.completed_at)
        .bind(task_id)
        .execute(pool)
        .await?;

    get_task(pool, task_id).await
}

pub async fn start_task(pool: &AnyPool, task_id: &str) -> AppResult<TaskRecord> {
    let task = get_task(pool, task_id).await?;

    let Some(target) = lifecycle::start(task.current_status()) else {
        return Ok(task);
    };

    sqlx::query("UPDATE maintenance_tasks SET status = ? WHERE id = ?")
        .bind(target.as_str())
        .bind(task_id)
        .execute(pool)
        .await?;

    get_task(pool, task_id).await
}

// Task checklists

pub async fn list_checklist_items(
    pool: &AnyPool,
    task_id: &str,
) -> AppResult<Vec<ChecklistItemRecord>> {
    let mut builder = QueryBuilder::<Any>::new(CHECKLIST_ITEM_SELECT);
    builder.push(" WHERE c.task_id = ");
    builder.push_bind(task_id);
    builder.push(" ORDER BY c.seq ASC");

    let items = builder
        .build_query_as::<ChecklistItemRecord>()
        .fetch_all(pool)
        .await?;
    Ok(items)
}

pub async fn get_checklist_item(
    pool: &AnyPool,
    task_id: &str,
    item_id: &str,
) -> AppResult<ChecklistItemRecord> {
    let mut builder = QueryBuilder::<Any>::new(CHECKLIST_ITEM_SELECT);
    builder.push(" WHERE c.task_id = ");
    builder.push_bind(task_id);
    builder.push(" AND c.id = ");
    builder.push_bind(item_id);

    let item = builder
        .build_query_as::<ChecklistItemRecord>()
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("checklist item", item_id))?;

    Ok(item)
}

/// Snapshots every template item onto the task, all or nothing.
pub async fn instantiate_template(
    pool: &AnyPool,
    task_id: &str,
    template_id: &str,
    asset_id: Option<&str>,
) -> AppResult<Vec<ChecklistItemRecord>> {
    let mut tx = pool.begin().await?;

    let site_id: String = sqlx::query_scalar("SELECT site_id FROM maintenance_tasks WHERE id = ?")
        .bind(task_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("task", task_id))?;

    let items = scoped_template_items(&mut tx, template_id, &site_id).await?;
    let asset_id = asset_at_site(&mut tx, asset_id, &site_id).await?;
    insert_snapshots(&mut tx, task_id, &items, asset_id.as_deref()).await?;

    tx.commit().await?;
    list_checklist_items(pool, task_id).await
}

pub async fn add_checklist_item(
    pool: &AnyPool,
    task_id: &str,
    input: AdhocItemInput,
) -> AppResult<ChecklistItemRecord> {
    let label = required_text(&input.label, "item label")?;
    let item_id = Uuid::new_v4().to_string();

    let mut tx = pool.begin().await?;

    let site_id: String = sqlx::query_scalar("SELECT site_id FROM maintenance_tasks WHERE id = ?")
        .bind(task_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("task", task_id))?;

    let asset_id = asset_at_site(&mut tx, input.asset_id.as_deref(), &site_id).await?;
    let seq = next_checklist_seq(&mut tx, task_id).await?;

    sqlx::query(
        r#"
        INSERT INTO task_checklist_items (
            id, task_id, seq, asset_id, template_item_id, label_snapshot, item_type, required, unit
        )
        VALUES (?, ?, ?, ?, NULL, ?, ?, ?, ?)
        "#,
    )
    .bind(&item_id)
    .bind(task_id)
    .bind(seq)
    .bind(asset_id)
    .bind(&label)
    .bind(input.item_type.as_str())
    .bind(i64::from(input.required))
    .bind(input.unit.trim())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    get_checklist_item(pool, task_id, &item_id).await
}

/// Writes a batch of answers and, when closing, the final task state.
pub async fn save_answers(
    pool: &AnyPool,
    task_id: &str,
    updates: &[AnswerUpdate],
    closure: Option<&TaskClosure>,
) -> AppResult<()> {
    let mut tx = pool.begin().await?;

    for update in updates {
        let columns = update.answer.to_columns();
        sqlx::query(
            r#"
            UPDATE task_checklist_items
            SET
                value_text = ?,
                value_number = ?,
                value_bool = ?,
                attachment_key = ?,
                attachment_filename = ?,
                attachment_content_type = ?
            WHERE id = ? AND task_id = ?
            "#,
        )
        .bind(columns.value_text)
        .bind(columns.value_number)
        .bind(columns.value_bool)
        .bind(columns.attachment_key)
        .bind(columns.attachment_filename)
        .bind(columns.attachment_content_type)
        .bind(&update.item_id)
        .bind(task_id)
        .execute(&mut *tx)
        .await?;
    }

    if let Some(closure) = closure {
        let result = sqlx::query(
            "UPDATE maintenance_tasks SET status = ?, completed_at = ?, report_key = ? WHERE id = ?",
        )
        .bind(closure.status.as_str())
        .bind(closure.completed_at.as_deref())
        .bind(&closure.report_key)
        .bind(task_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("task", task_id));
        }
    }

    tx.commit().await?;
    Ok(())
}

// Dashboard

pub async fn dashboard(pool: &AnyPool) -> AppResult<Dashboard> {
    let total_assets: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM assets")
        .fetch_one(pool)
        .await?;
    let total_sites: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sites")
        .fetch_one(pool)
        .await?;
    let open_tasks: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM maintenance_tasks WHERE status NOT IN ('done', 'cancelled')",
    )
    .fetch_one(pool)
    .await?;

    let task_stats = sqlx::query_as::<Any, TaskStats>(
        r#"
        SELECT
            COUNT(*) AS total,
            COUNT(CASE WHEN status = 'scheduled' THEN 1 END) AS scheduled,
            COUNT(CASE WHEN status = 'in_progress' THEN 1 END) AS in_progress,
            COUNT(CASE WHEN status = 'done' THEN 1 END) AS done
        FROM maintenance_tasks
        "#,
    )
    .fetch_one(pool)
    .await?;

    let sites = list_sites(pool, None).await?;

    let mut upcoming = QueryBuilder::<Any>::new(TASK_SELECT);
    upcoming.push(" WHERE t.status IN ('scheduled', 'in_progress') ORDER BY t.scheduled_for ASC LIMIT 6");
    let upcoming_tasks = upcoming.build_query_as::<TaskRecord>().fetch_all(pool).await?;

    let mut done = QueryBuilder::<Any>::new(TASK_SELECT);
    done.push(" WHERE t.status = 'done' ORDER BY t.scheduled_for DESC LIMIT 4");
    let recent_done_tasks = done.build_query_as::<TaskRecord>().fetch_all(pool).await?;

    let mut recent = QueryBuilder::<Any>::new(ASSET_SELECT);
    recent.push(" ORDER BY a.created_at DESC LIMIT 6");
    let recent_assets = recent.build_query_as::<AssetRecord>().fetch_all(pool).await?;

    Ok(Dashboard {
        total_assets,
        total_sites,
        open_tasks,
        task_stats,
        sites,
        upcoming_tasks,
        recent_done_tasks,
        recent_assets,
    })
}

async fn scoped_template_items(
    tx: &mut Transaction<'_, Any>,
    template_id: &str,
    site_id: &str,
) -> AppResult<Vec<TemplateItemRecord>> {
    let scope: Option<Option<String>> =
        sqlx::query_scalar("SELECT site_id FROM checklist_templates WHERE id = ?")
            .bind(template_id)
            .fetch_optional(&mut **tx)
            .await?;

    match scope {
        None => return Err(AppError::not_found("checklist template", template_id)),
        Some(Some(template_site)) if template_site != site_id => {
            return Err(AppError::BadRequest(format!(
                "checklist template '{template_id}' belongs to another site"
            )));
        }
        Some(_) => {}
    }

    let mut builder = QueryBuilder::<Any>::new(TEMPLATE_ITEM_SELECT);
    builder.push(" WHERE template_id = ");
    builder.push_bind(template_id);
    builder.push(" ORDER BY position ASC, seq ASC");

    let items = builder
        .build_query_as::<TemplateItemRecord>()
        .fetch_all(&mut **tx)
        .await?;
    Ok(items)
}

/// Keeps an asset tag only when the asset exists at the task's site.
async fn asset_at_site(
    tx: &mut Transaction<'_, Any>,
    asset_id: Option<&str>,
    site_id: &str,
) -> AppResult<Option<String>> {
    let Some(asset_id) = non_empty(asset_id) else {
        return Ok(None);
    };

    let found = sqlx::query_scalar::<Any, String>("SELECT id FROM assets WHERE id = ? AND site_id = ?")
        .bind(&asset_id)
        .bind(site_id)
        .fetch_optional(&mut **tx)
        .await?;

    if found.is_none() {
        tracing::debug!(asset_id = %asset_id, site_id, "dropping asset tag from another site");
    }

    Ok(found)
}

async fn next_checklist_seq(tx: &mut Transaction<'_, Any>, task_id: &str) -> AppResult<i64> {
    let seq = sqlx::query_scalar::<Any, i64>(
        "SELECT COALESCE(MAX(seq), 0) + 1 FROM task_checklist_items WHERE task_id = ?",
    )
    .bind(task_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(seq)
}

async fn insert_snapshots(
    tx: &mut Transaction<'_, Any>,
    task_id: &str,
    items: &[TemplateItemRecord],
    asset_id: Option<&str>,
) -> AppResult<()> {
    let mut seq = next_checklist_seq(tx, task_id).await?;

    for item in items {
        sqlx::query(
            r#"
            INSERT INTO task_checklist_items (
                id, task_id, seq, asset_id, template_item_id, label_snapshot, item_type, required, unit
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(task_id)
        .bind(seq)
        .bind(asset_id)
        .bind(&item.id)
        .bind(&item.label)
        .bind(item.item_type().as_str())
        .bind(item.required)
        .bind(&item.unit)
        .execute(&mut **tx)
        .await?;
        seq += 1;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::db::queries;
    use crate::db::testing::{new_task, seed_site, setup_db};
    use crate::domain::codes::{AssetStatus, ItemType, TaskStatus};
    use crate::error::AppError;

    async fn seed_asset(pool: &sqlx::AnyPool, site_id: &str, name: &str) -> String {
        queries::create_asset(
            pool,
            queries::NewAssetInput {
                site_id: site_id.to_string(),
                name: name.to_string(),
                asset_type: "Caldaia".to_string(),
                serial: "SN-001".to_string(),
                vendor: "Baxi".to_string(),
                purchase_date: None,
                status: AssetStatus::Active,
            },
        )
        .await
        .expect("asset should be created")
        .id
    }

    async fn seed_template(
        pool: &sqlx::AnyPool,
        site_id: Option<&str>,
        labels: &[(&str, ItemType, i64)],
    ) -> String {
        let template = queries::create_template(
            pool,
            queries::NewTemplateInput {
                name: "Ispezione mensile".to_string(),
                site_id: site_id.map(ToOwned::to_owned),
            },
        )
        .await
        .expect("template should be created");

        for (label, item_type, position) in labels {
            queries::add_template_item(
                pool,
                &template.id,
                queries::TemplateItemInput {
                    label: (*label).to_string(),
                    item_type: *item_type,
                    required: true,
                    unit: if *item_type == ItemType::Number {
                        "bar".to_string()
                    } else {
                        String::new()
                    },
                    position: *position,
                },
            )
            .await
            .expect("template item should be created");
        }

        template.id
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(queries::like_pattern(" Sede_1 "), "%sede\\_1%");
        assert_eq!(queries::like_pattern("50%"), "%50\\%%");
    }

    #[tokio::test]
    async fn asset_tokens_are_unique_and_stable() {
        let (_temp_dir, pool) = setup_db("asset-tokens").await;
        let site_id = seed_site(&pool, "Asilo Nord").await;

        let first = seed_asset(&pool, &site_id, "Caldaia").await;
        let second = seed_asset(&pool, &site_id, "Condizionatore").await;

        let first = queries::get_asset(&pool, &first).await.expect("first asset");
        let second = queries::get_asset(&pool, &second).await.expect("second asset");
        assert_ne!(first.qr_token, second.qr_token);

        let updated = queries::update_asset(
            &pool,
            &first.id,
            queries::UpdateAssetInput {
                name: Some("Caldaia principale".to_string()),
                status: Some(AssetStatus::OutOfService),
                ..queries::UpdateAssetInput::default()
            },
        )
        .await
        .expect("asset should be updated");
        assert_eq!(updated.qr_token, first.qr_token);
        assert_eq!(updated.status, "out_of_service");

        let found = queries::get_asset_by_token(&pool, &first.qr_token.to_uppercase())
            .await
            .expect("lookup by token should succeed");
        assert_eq!(found.id, first.id);

        let prefix = &first.qr_token[..8];
        assert!(matches!(
            queries::get_asset_by_token(&pool, prefix).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_token_surfaces_as_conflict() {
        let (_temp_dir, pool) = setup_db("token-conflict").await;
        let site_id = seed_site(&pool, "Asilo Nord").await;
        let asset_id = seed_asset(&pool, &site_id, "Caldaia").await;
        let asset = queries::get_asset(&pool, &asset_id).await.expect("asset");

        let result = sqlx::query(
            "INSERT INTO assets (id, site_id, name, status, qr_token, created_at) VALUES (?, ?, ?, 'active', ?, ?)",
        )
        .bind("duplicate")
        .bind(&site_id)
        .bind("Clone")
        .bind(&asset.qr_token)
        .bind("2024-01-01T00:00:00Z")
        .execute(&pool)
        .await
        .map_err(AppError::from);

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn asset_search_matches_site_name() {
        let (_temp_dir, pool) = setup_db("asset-search").await;
        let north = seed_site(&pool, "Asilo Girasole").await;
        let south = seed_site(&pool, "Scuola Sud").await;
        let matching = seed_asset(&pool, &north, "Estintore").await;
        seed_asset(&pool, &south, "Estintore").await;

        let assets = queries::list_assets(
            &pool,
            queries::AssetFilters {
                query: Some("girasole".to_string()),
                ..queries::AssetFilters::default()
            },
        )
        .await
        .expect("assets should be listed");

        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].id, matching);
        assert_eq!(assets[0].site_name, "Asilo Girasole");

        let disposed = queries::list_assets(
            &pool,
            queries::AssetFilters {
                status: Some("disposed".to_string()),
                ..queries::AssetFilters::default()
            },
        )
        .await
        .expect("assets should be listed");
        assert!(disposed.is_empty());
    }

    #[tokio::test]
    async fn instantiation_snapshots_template_in_order() {
        let (_temp_dir, pool) = setup_db("instantiate").await;
        let site_id = seed_site(&pool, "Asilo Nord").await;
        let template_id = seed_template(
            &pool,
            None,
            &[
                ("Pressione impianto", ItemType::Number, 2),
                ("Spia accesa", ItemType::YesNo, 1),
                ("Foto targhetta", ItemType::Photo, 2),
            ],
        )
        .await;
        let task = new_task(&pool, &site_id, "Controllo caldaia").await;

        let items = queries::instantiate_template(&pool, &task.id, &template_id, None)
            .await
            .expect("checklist should be generated");

        let labels: Vec<&str> = items.iter().map(|item| item.label_snapshot.as_str()).collect();
        assert_eq!(labels, ["Spia accesa", "Pressione impianto", "Foto targhetta"]);
        assert_eq!(items[1].item_type, "number");
        assert_eq!(items[1].unit, "bar");
        assert_eq!(items[1].required, 1);

        let template_items = queries::template_items(&pool, &template_id)
            .await
            .expect("template items");
        queries::update_template_item(
            &pool,
            &template_id,
            &template_items[0].id,
            queries::UpdateTemplateItemInput {
                label: Some("Spia spenta".to_string()),
                item_type: Some(ItemType::Text),
                ..queries::UpdateTemplateItemInput::default()
            },
        )
        .await
        .expect("template item should be updated");
        queries::delete_template_item(&pool, &template_id, &template_items[1].id)
            .await
            .expect("template item should be deleted");

        let after = queries::list_checklist_items(&pool, &task.id)
            .await
            .expect("items should be listed");
        assert_eq!(after.len(), 3);
        assert_eq!(after[0].label_snapshot, "Spia accesa");
        assert_eq!(after[0].item_type, "yesno");
        assert!(after[1].template_item_id.is_none());
    }

    #[tokio::test]
    async fn template_scoped_to_other_site_is_rejected() {
        let (_temp_dir, pool) = setup_db("template-scope").await;
        let site_x = seed_site(&pool, "Sede X").await;
        let site_y = seed_site(&pool, "Sede Y").await;
        let scoped = seed_template(&pool, Some(&site_x), &[("Porte", ItemType::YesNo, 0)]).await;
        let global = seed_template(&pool, None, &[("Luci", ItemType::YesNo, 0)]).await;
        let task = new_task(&pool, &site_y, "Giro sicurezza").await;

        let rejected = queries::instantiate_template(&pool, &task.id, &scoped, None).await;
        assert!(matches!(rejected, Err(AppError::BadRequest(_))));
        assert!(queries::list_checklist_items(&pool, &task.id)
            .await
            .expect("items")
            .is_empty());

        let items = queries::instantiate_template(&pool, &task.id, &global, None)
            .await
            .expect("global template should apply");
        assert_eq!(items.len(), 1);

        let mut input = crate::db::testing::task_input(&site_y, "Con modello altrui");
        input.template_id = Some(scoped);
        assert!(matches!(
            queries::create_task(&pool, input).await,
            Err(AppError::BadRequest(_))
        ));
        let tasks = queries::list_tasks(
            &pool,
            queries::TaskFilters {
                site_id: Some(site_y.clone()),
                ..queries::TaskFilters::default()
            },
        )
        .await
        .expect("tasks");
        assert_eq!(tasks.len(), 1);
    }

    #[tokio::test]
    async fn asset_tag_from_other_site_is_dropped() {
        let (_temp_dir, pool) = setup_db("asset-tag").await;
        let here = seed_site(&pool, "Qui").await;
        let there = seed_site(&pool, "Altrove").await;
        let local_asset = seed_asset(&pool, &here, "Quadro elettrico").await;
        let foreign_asset = seed_asset(&pool, &there, "Quadro elettrico").await;
        let task = new_task(&pool, &here, "Verifica quadro").await;

        let tagged = queries::add_checklist_item(
            &pool,
            &task.id,
            queries::AdhocItemInput {
                label: "Interruttore differenziale".to_string(),
                item_type: ItemType::YesNo,
                required: false,
                unit: String::new(),
                asset_id: Some(local_asset.clone()),
            },
        )
        .await
        .expect("item should be added");
        assert_eq!(tagged.asset_id.as_deref(), Some(local_asset.as_str()));
        assert_eq!(tagged.asset_name.as_deref(), Some("Quadro elettrico"));

        let untagged = queries::add_checklist_item(
            &pool,
            &task.id,
            queries::AdhocItemInput {
                label: "Cavi".to_string(),
                item_type: ItemType::Text,
                required: false,
                unit: String::new(),
                asset_id: Some(foreign_asset),
            },
        )
        .await
        .expect("item should be added");
        assert!(untagged.asset_id.is_none());
        assert!(untagged.seq > tagged.seq);
    }

    #[tokio::test]
    async fn unknown_status_is_a_no_op() {
        let (_temp_dir, pool) = setup_db("status-noop").await;
        let site_id = seed_site(&pool, "Asilo Nord").await;
        let task = new_task(&pool, &site_id, "Pulizia filtri").await;

        let unchanged = queries::update_task_status(&pool, &task.id, "archived")
            .await
            .expect("unknown status should not fail");
        assert_eq!(unchanged.status, "scheduled");

        let done = queries::update_task_status(&pool, &task.id, "done")
            .await
            .expect("status update should succeed");
        assert_eq!(done.status, "done");
        let completed_at = done.completed_at.clone().expect("completion should be stamped");

        let again = queries::update_task_status(&pool, &task.id, "done")
            .await
            .expect("status update should succeed");
        assert_eq!(again.completed_at.as_deref(), Some(completed_at.as_str()));

        let reopened = queries::update_task_status(&pool, &task.id, "in_progress")
            .await
            .expect("status update should succeed");
        assert_eq!(reopened.completed_at.as_deref(), Some(completed_at.as_str()));
    }

    #[tokio::test]
    async fn start_only_moves_open_tasks() {
        let (_temp_dir, pool) = setup_db("start-task").await;
        let site_id = seed_site(&pool, "Asilo Nord").await;
        let task = new_task(&pool, &site_id, "Sostituzione lampade").await;

        let started = queries::start_task(&pool, &task.id).await.expect("start");
        assert_eq!(started.status, TaskStatus::InProgress.as_str());

        queries::update_task_status(&pool, &task.id, "cancelled")
            .await
            .expect("cancel");
        let still_cancelled = queries::start_task(&pool, &task.id).await.expect("start");
        assert_eq!(still_cancelled.status, "cancelled");
    }

    #[tokio::test]
    async fn site_summaries_count_assets_and_open_tasks() {
        let (_temp_dir, pool) = setup_db("site-summary").await;
        let site_id = seed_site(&pool, "Asilo Nord").await;
        seed_asset(&pool, &site_id, "Caldaia").await;
        seed_asset(&pool, &site_id, "Estintore").await;
        new_task(&pool, &site_id, "Aperto").await;
        let closed = new_task(&pool, &site_id, "Chiuso").await;
        queries::update_task_status(&pool, &closed.id, "done")
            .await
            .expect("close");

        let sites = queries::list_sites(&pool, Some("nord")).await.expect("sites");
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].asset_count, 2);
        assert_eq!(sites[0].open_task_count, 1);

        let dashboard = queries::dashboard(&pool).await.expect("dashboard");
        assert_eq!(dashboard.task_stats.total, 2);
        assert_eq!(dashboard.task_stats.done, 1);
        assert_eq!(dashboard.open_tasks, 1);
    }

    #[tokio::test]
    async fn deleting_site_cascades_and_template_becomes_global() {
        let (_temp_dir, pool) = setup_db("site-cascade").await;
        let site_id = seed_site(&pool, "Da chiudere").await;
        seed_asset(&pool, &site_id, "Caldaia").await;
        let template_id = seed_template(&pool, Some(&site_id), &[("Porte", ItemType::YesNo, 0)]).await;
        let task = new_task(&pool, &site_id, "Ultimo giro").await;

        queries::delete_site(&pool, &site_id).await.expect("site should be deleted");

        assert!(matches!(
            queries::get_task(&pool, &task.id).await,
            Err(AppError::NotFound(_))
        ));
        let template = queries::get_template(&pool, &template_id)
            .await
            .expect("template should survive");
        assert!(template.site_id.is_none());
    }

    #[tokio::test]
    async fn deleting_plan_keeps_tasks() {
        let (_temp_dir, pool) = setup_db("plan-weak-link").await;
        let site_id = seed_site(&pool, "Asilo Nord").await;
        let plan = queries::create_plan(
            &pool,
            queries::NewPlanInput {
                site_id: site_id.clone(),
                title: "Manutenzione caldaia".to_string(),
                frequency: crate::domain::codes::PlanFrequency::Quarterly,
                next_due: None,
                active: true,
                assigned_to: Some("tecnico".to_string()),
            },
        )
        .await
        .expect("plan should be created");

        let mut input = crate::db::testing::task_input(&site_id, "Da piano");
        input.plan_id = Some(plan.id.clone());
        let task = queries::create_task(&pool, input).await.expect("task");
        assert_eq!(task.plan_id.as_deref(), Some(plan.id.as_str()));

        queries::delete_plan(&pool, &plan.id).await.expect("plan delete");
        let task = queries::get_task(&pool, &task.id).await.expect("task survives");
        assert!(task.plan_id.is_none());
    }
}
