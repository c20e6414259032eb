#[macro_export]
macro_rules! log_err {
    // Usage: log_err!(&self.pool, &error, params);
    ($pool:expr, $err:expr, $params:expr) => {{
        let pool_clone = $pool.clone();
        let location = format!("{}:{}", file!(), line!());

        ::log::error!("{}: {}", location, $err);

        let params_json = ::serde_json::to_value($params)
            .unwrap_or(::serde_json::Value::Null);

        ::tokio::spawn(async move {
            let result = ::sqlx::query(
                r#"
                    INSERT INTO error_logs (location, parameters)
                    VALUES ($1, $2)
                    "#,
            )
            .bind(location)
            .bind(params_json)
            .execute(&pool_clone)
            .await;

            if let Err(e) = result {
                ::log::warn!("Failed to persist error log: {}", e);
            }
        });
    }};
}
