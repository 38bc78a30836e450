use std::sync::{Arc, RwLock};

use serde_json::json;

use crate::{
    logging::OpScope,
    model::{Employee, EmployeeFilter, Role},
    store::ClientStore,
    sync::ClientView,
    util::fenced,
    AppError, AppResult,
};

/// Employees a viewer may pick from in the assign form.
pub fn roster_filter(view: ClientView, role: &Role) -> Option<EmployeeFilter> {
    match (view, role) {
        (ClientView::All, Role::Head | Role::Employee | Role::Admin) => Some(EmployeeFilter {
            role: Role::Employee,
            active_only: false,
        }),
        (ClientView::Finance, Role::FinanceEmployee) => Some(EmployeeFilter {
            role: Role::FinanceEmployee,
            active_only: true,
        }),
        _ => None,
    }
}

pub struct Roster<S: ?Sized> {
    store: Arc<S>,
    view: ClientView,
    employees: RwLock<Arc<Vec<Employee>>>,
}

impl<S> Roster<S>
where
    S: ClientStore + ?Sized,
{
    pub fn new(store: Arc<S>, view: ClientView) -> Self {
        Self {
            store,
            view,
            employees: RwLock::new(Arc::new(Vec::new())),
        }
    }

    pub fn employees(&self) -> Arc<Vec<Employee>> {
        self.employees
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Loads the roster for `role`. Roles without a roster leave it untouched
    /// and return `Ok(None)`; a failed query keeps the previous roster.
    pub async fn load(&self, role: &Role) -> AppResult<Option<usize>> {
        let Some(filter) = roster_filter(self.view, role) else {
            return Ok(None);
        };
        let scope = OpScope::new("employees_load", None, None);

        match fenced("select_employees", self.store.select_employees(&filter)).await {
            Ok(rows) => {
                let count = rows.len();
                *self.employees.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(rows);
                scope.success(
                    None,
                    json!({ "view": self.view.as_str(), "role": filter.role.as_str(), "rows": count }),
                );
                Ok(Some(count))
            }
            Err(err) => {
                let err = AppError::store_unavailable("select_employees", err);
                scope.fail(&err);
                Err(err)
            }
        }
    }
}
