mod http;
mod websocket;

pub use http::{
    health_check, list_bookings, list_branches, portal_login, portal_logout, portal_me,
    portal_refresh, staff_login, staff_logout, staff_me, staff_refresh,
};
pub use websocket::{DashboardSnapshot, UNAUTHORIZED_CLOSE_CODE, dashboard_ws};
