//! The built-in rule table used when no `[authorization].rules` are configured.
//!
//! Declaration order matters. `/api/**` precedes the account endpoints
//! (`/api/register`, `/api/activate`, password reset), so those four rules are
//! shadowed and the endpoints require authentication. `RuleTable::shadowed_rules`
//! reports them at startup.

use axum::http::Method;

use crate::security::principal::authorities::ADMIN;
use crate::security::rules::{RuleError, RuleTable};

pub fn default_rule_table() -> Result<RuleTable, RuleError> {
    RuleTable::builder()
        .matchers(&["/app/**"]).permit_all()
        .matchers(&["/i18n/**"]).permit_all()
        .matchers(&["/index.html", "/*.js", "/*.txt", "/*.json", "/*.map", "/*.css"]).permit_all()
        .matchers(&["/*.ico", "/*.png", "/*.svg", "/*.webapp"]).permit_all()
        .matchers(&["/swagger-ui/**"]).permit_all()
        .matchers_for(Method::POST, &["/api/authenticate"]).permit_all()
        .matchers_for(Method::GET, &["/api/authenticate"]).permit_all()
        .matchers(&["/api/admin/**"]).has_authority(ADMIN)
        .matchers(&["/api/**"]).authenticated()
        .matchers(&["/v3/api-docs/**"]).has_authority(ADMIN)
        .matchers(&["/management/health"]).permit_all()
        .matchers(&["/management/health/**"]).permit_all()
        .matchers(&["/management/info"]).permit_all()
        .matchers(&["/management/prometheus"]).permit_all()
        .matchers(&["/management/**"]).has_authority(ADMIN)
        .matchers(&["/api/register"]).permit_all()
        .matchers(&["/api/activate"]).permit_all()
        .matchers(&["/api/account/reset-password/init"]).permit_all()
        .matchers(&["/api/account/reset-password/finish"]).permit_all()
        .build()
}
