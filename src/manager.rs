//! EntryManager: the external interface of the core. Routes each operation
//! to the right per-application store (five independent database files) and
//! searches across stores when the caller only has a row id.

use std::fs;
use std::path::{Path, PathBuf};

use crate::db::{Store, filter, mutate, settings, store};
use crate::errors::{AppError, AppResult};
use crate::models::application::{ALL_APPLICATIONS, Application};
use crate::models::items::{EntryInput, LogicalEntry, RowView};
use crate::models::row_kind::RowFilter;
use crate::validate::{validate_entry_input, validate_row_patch};

pub struct EntryManager {
    stores: Vec<(Application, Store)>,
}

impl EntryManager {
    /// Open (creating if needed) the five per-application stores under the
    /// data directory.
    pub fn open(data_dir: &Path) -> AppResult<Self> {
        fs::create_dir_all(data_dir)?;
        let mut stores = Vec::with_capacity(ALL_APPLICATIONS.len());
        for app in ALL_APPLICATIONS {
            let path: PathBuf = data_dir.join(app.db_file());
            stores.push((app, Store::open(&path)?));
        }
        Ok(EntryManager { stores })
    }

    fn store(&self, app: Application) -> &Store {
        // The store list is built from ALL_APPLICATIONS, so every variant
        // is present.
        self.stores
            .iter()
            .find(|(a, _)| *a == app)
            .map(|(_, s)| s)
            .unwrap()
    }

    fn store_mut(&mut self, app: Application) -> &mut Store {
        self.stores
            .iter_mut()
            .find(|(a, _)| *a == app)
            .map(|(_, s)| s)
            .unwrap()
    }

    fn resolve_app(&self, name: &str) -> AppResult<Application> {
        Application::from_name(name).ok_or_else(|| AppError::UnknownApplication(name.to_string()))
    }

    /// Create a logical entry; rejected before storage on validation
    /// failure, and with `DuplicateEntry` when a main row already exists
    /// for the (date, application) pair.
    pub fn create_logical_entry(&mut self, input: &EntryInput) -> AppResult<LogicalEntry> {
        let app = validate_entry_input(input)?;
        let store = self.store_mut(app);
        mutate::create_entry(&mut store.conn, input)
    }

    /// Grouped view by id. With an application hint only that store is
    /// consulted first; otherwise every store is searched in turn (ids are
    /// unique per store, not globally).
    pub fn get_logical_entry(
        &self,
        id: i64,
        application: Option<&str>,
    ) -> AppResult<Option<LogicalEntry>> {
        if let Some(name) = application {
            let app = self.resolve_app(name)?;
            if let Some(entry) = mutate::get_entry(&self.store(app).conn, id)? {
                return Ok(Some(entry));
            }
        }
        for (_, store) in &self.stores {
            if let Some(entry) = mutate::get_entry(&store.conn, id)? {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    pub fn list_logical_entries(
        &self,
        application: &str,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> AppResult<Vec<LogicalEntry>> {
        let app = self.resolve_app(application)?;
        mutate::list_entries(&self.store(app).conn, app.name(), start_date, end_date)
    }

    /// Row-level filter path. Without an application the five stores are
    /// queried independently and the results concatenated.
    pub fn list_rows(
        &self,
        application: Option<&str>,
        start_date: Option<&str>,
        end_date: Option<&str>,
        kind: RowFilter,
    ) -> AppResult<Vec<RowView>> {
        match application {
            Some(name) => {
                let app = self.resolve_app(name)?;
                filter::filter_rows(&self.store(app).conn, app.name(), start_date, end_date, kind)
            }
            None => {
                let mut all = Vec::new();
                for (app, store) in &self.stores {
                    all.extend(filter::filter_rows(
                        &store.conn,
                        app.name(),
                        start_date,
                        end_date,
                        kind,
                    )?);
                }
                Ok(all)
            }
        }
    }

    /// Comprehensive update of the logical entry whose main row is `id`.
    pub fn update_logical_entry(
        &mut self,
        id: i64,
        input: &EntryInput,
        application: Option<&str>,
    ) -> AppResult<LogicalEntry> {
        let app = match application {
            Some(name) => self.resolve_app(name)?,
            None => self
                .find_app_for_id(id)?
                .ok_or(AppError::NotFound(id))?,
        };

        // The entry's own application fills any gap before validation.
        let mut effective = input.clone();
        if effective.application_name.trim().is_empty() {
            effective.application_name = app.name().to_string();
        }
        if effective.date.trim().is_empty()
            && let Some(row) = store::fetch_by_id(&self.store(app).conn, id)?
        {
            effective.date = row.date;
        }
        validate_entry_input(&effective)?;

        let store = self.store_mut(app);
        mutate::update_entry(&mut store.conn, id, &effective)
    }

    /// Row-scoped patch: update whitelisted columns of exactly one row,
    /// never cascading to siblings.
    pub fn update_row_fields(
        &mut self,
        id: i64,
        fields: &serde_json::Map<String, serde_json::Value>,
        application: Option<&str>,
    ) -> AppResult<()> {
        let app = match application {
            Some(name) => self.resolve_app(name)?,
            None => self.find_app_for_id(id)?.ok_or(AppError::NotFound(id))?,
        };
        validate_row_patch(app, fields)?;
        let changed = store::update_fields(&self.store(app).conn, id, fields)?;
        if changed == 0 {
            return Err(AppError::NotFound(id));
        }
        Ok(())
    }

    /// Destroy the whole logical entry containing `id`.
    pub fn delete_logical_entry(&mut self, id: i64, application: Option<&str>) -> AppResult<bool> {
        if let Some(name) = application {
            let app = self.resolve_app(name)?;
            let store = self.store_mut(app);
            return mutate::delete_entry(&mut store.conn, id);
        }
        for (_, store) in self.stores.iter_mut() {
            if mutate::delete_entry(&mut store.conn, id)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Delete a single row by id, leaving its group in place.
    pub fn delete_row(&mut self, id: i64, application: Option<&str>) -> AppResult<bool> {
        if let Some(name) = application {
            let app = self.resolve_app(name)?;
            let store = self.store_mut(app);
            return mutate::delete_row(&mut store.conn, id);
        }
        for (_, store) in self.stores.iter_mut() {
            if mutate::delete_row(&mut store.conn, id)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn get_setting(&self, key: &str, application: Option<&str>) -> AppResult<Option<String>> {
        let app = self.settings_app(application)?;
        Ok(settings::get_setting(&self.store(app).conn, key)?)
    }

    pub fn set_setting(
        &mut self,
        key: &str,
        value: &str,
        application: Option<&str>,
    ) -> AppResult<()> {
        let app = self.settings_app(application)?;
        Ok(settings::set_setting(&self.store(app).conn, key, value)?)
    }

    // Settings live in the CVAR ALL store unless a caller names another.
    fn settings_app(&self, application: Option<&str>) -> AppResult<Application> {
        match application {
            Some(name) => self.resolve_app(name),
            None => Ok(Application::CvarAll),
        }
    }

    fn find_app_for_id(&self, id: i64) -> AppResult<Option<Application>> {
        for (app, store) in &self.stores {
            if store::fetch_by_id(&store.conn, id)?.is_some() {
                return Ok(Some(*app));
            }
        }
        Ok(None)
    }
}
