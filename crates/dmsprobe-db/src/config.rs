use sqlx::mysql::MySqlConnectOptions;

use dmsprobe_core::types::Credentials;

/// Connection options for one call against the database named in
/// `credentials`.
pub fn connect_options(credentials: &Credentials) -> MySqlConnectOptions {
    MySqlConnectOptions::new()
        .host(&credentials.host)
        .port(credentials.port)
        .username(&credentials.username)
        .password(&credentials.password)
        .database(&credentials.dbname)
        .charset("utf8mb4")
}

/// `host:port/dbname`, for logs and errors. Never includes the password.
pub fn endpoint(credentials: &Credentials) -> String {
    format!(
        "{}:{}/{}",
        credentials.host, credentials.port, credentials.dbname
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            host: "db.internal".into(),
            port: 3307,
            username: "admin".into(),
            password: "hunter2".into(),
            dbname: "sample".into(),
        }
    }

    #[test]
    fn options_follow_credentials() {
        let opts = connect_options(&credentials());
        assert_eq!(opts.get_host(), "db.internal");
        assert_eq!(opts.get_port(), 3307);
        assert_eq!(opts.get_username(), "admin");
        assert_eq!(opts.get_database(), Some("sample"));
    }

    #[test]
    fn endpoint_omits_password() {
        let endpoint = endpoint(&credentials());
        assert_eq!(endpoint, "db.internal:3307/sample");
    }
}
