//! Route path constants.

/// POST /api/auth/register
pub const POST_API_AUTH_REGISTER: &str = "/api/auth/register";

/// POST /api/auth/login
pub const POST_API_AUTH_LOGIN: &str = "/api/auth/login";

/// POST /api/auth/logout
pub const POST_API_AUTH_LOGOUT: &str = "/api/auth/logout";

/// GET /api/auth/verify
pub const GET_API_AUTH_VERIFY: &str = "/api/auth/verify";

/// GET /api/processes — global processes plus the caller's own.
pub const GET_API_PROCESSES: &str = "/api/processes";

/// POST /api/processes — upsert processes by id.
pub const POST_API_PROCESSES: &str = "/api/processes";

/// POST /api/import/{entity} — replace a collection from an uploaded workbook.
pub const POST_API_IMPORT_ENTITY: &str = "/api/import/{entity}";

/// GET /api/health
pub const GET_API_HEALTH: &str = "/api/health";
