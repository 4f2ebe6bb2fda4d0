//! Request/response types for admin endpoints.

use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::admin::{
    form::FormField, options::ModelAdminOptions, Branding, Fieldset, FormErrors, ModelAdmin,
};

#[derive(ToSchema, Serialize, Debug)]
pub struct FormFieldBody {
    pub name: String,
    pub label: String,
    pub input_type: String,
    pub required: bool,
    pub max_length: Option<usize>,
}

impl From<FormField> for FormFieldBody {
    fn from(field: FormField) -> Self {
        Self {
            name: field.name.to_string(),
            label: field.label.to_string(),
            input_type: field.input_type.to_string(),
            required: field.required,
            max_length: field.max_length,
        }
    }
}

#[derive(ToSchema, Serialize, Debug)]
pub struct LoginPage {
    pub site_name: String,
    pub branding: Branding,
    pub template: Option<String>,
    pub fields: Vec<FormFieldBody>,
}

/// Errors keyed by field name; `__all__` holds the non-field errors.
#[derive(ToSchema, Serialize, Debug)]
pub struct LoginErrorResponse {
    pub code: String,
    pub errors: FormErrors,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct ModelOptionsBody {
    pub app_label: String,
    pub model_name: String,
    pub verbose_name: String,
    pub verbose_name_plural: String,
    pub list_display: Vec<String>,
    pub list_filter: Vec<String>,
    pub search_fields: Vec<String>,
    pub ordering: Vec<String>,
    pub list_per_page: u32,
}

fn owned(values: Vec<&'static str>) -> Vec<String> {
    values.into_iter().map(str::to_string).collect()
}

impl From<ModelAdminOptions> for ModelOptionsBody {
    fn from(options: ModelAdminOptions) -> Self {
        Self {
            app_label: options.app_label.to_string(),
            model_name: options.model_name.to_string(),
            verbose_name: options.verbose_name.to_string(),
            verbose_name_plural: options.verbose_name_plural.to_string(),
            list_display: owned(options.list_display),
            list_filter: owned(options.list_filter),
            search_fields: owned(options.search_fields),
            ordering: owned(options.ordering),
            list_per_page: options.list_per_page,
        }
    }
}

#[derive(ToSchema, Serialize, Debug)]
pub struct ModelEntry {
    pub app_label: String,
    pub model_name: String,
    pub verbose_name_plural: String,
    pub changelist_url: String,
}

impl ModelEntry {
    pub(crate) fn from_admin(admin: &dyn ModelAdmin) -> Self {
        let key = admin.model();
        Self {
            app_label: key.app_label.to_string(),
            model_name: key.model_name.to_string(),
            verbose_name_plural: admin.verbose_name_plural().to_string(),
            changelist_url: format!("/admin/{}/{}/", key.app_label, key.model_name),
        }
    }
}

#[derive(ToSchema, Serialize, Debug)]
pub struct AdminIndex {
    pub site_name: String,
    pub branding: Branding,
    pub user: String,
    pub models: Vec<ModelEntry>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct ChangelistResponse {
    pub model: ModelOptionsBody,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    #[schema(value_type = Vec<Object>)]
    pub results: Vec<Value>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct ChangeFormResponse {
    pub model: ModelOptionsBody,
    pub id: String,
    pub fieldsets: Vec<Fieldset>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::UserAdmin;

    #[test]
    fn model_entry_links_to_changelist() {
        let entry = ModelEntry::from_admin(&UserAdmin);
        assert_eq!(entry.changelist_url, "/admin/otp_app/customuser/");
        assert_eq!(entry.verbose_name_plural, "Users");
    }

    #[test]
    fn options_body_owns_values() {
        let body = ModelOptionsBody::from(UserAdmin.options());
        assert_eq!(body.list_per_page, 50);
        assert_eq!(body.search_fields, vec!["first_name", "last_name", "email"]);
    }
}
