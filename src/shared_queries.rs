//! SQL shared by both backends. Every statement here is portable and
//! sqlx accepts `$n` placeholders on Postgres and Sqlite alike.

pub const INSERT_INTO_LOGS_QUERY: &str = r#"INSERT INTO Logs
    (access_time, publisher_time, traverse_time, commit_time, transform_time,
     setstate_time, total_object_loads, object_loads_from_cache,
     objects_modified, action, url, start_rss, end_rss)
    VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)"#;
pub const COUNT_LOGS_QUERY: &str = "SELECT COUNT(*) FROM Logs";
pub const SELECT_ACCESS_TIME_BOUNDS_QUERY: &str =
    "SELECT MIN(access_time), MAX(access_time) FROM Logs";
pub const SUM_RENDER_TIME_QUERY: &str = "SELECT SUM(publisher_time) FROM Logs";
pub const SELECT_SLOWEST_URLS_QUERY: &str = "
            SELECT AVG(publisher_time) as average_render_time, url
            FROM Logs
            GROUP BY url
            ORDER BY average_render_time DESC
            LIMIT $1
            ";
pub const SELECT_RESPONSE_TIMES_BY_URL_QUERY: &str = "
            SELECT access_time, publisher_time
            FROM Logs
            WHERE url = $1
            ORDER BY access_time ASC
            ";
pub const SUM_RENDER_TIME_BY_URL_QUERY: &str =
    "SELECT SUM(publisher_time) FROM Logs WHERE url = $1";
pub const COUNT_LOGS_BY_URL_QUERY: &str = "SELECT COUNT(*) FROM Logs WHERE url = $1";
pub const SELECT_MEMORY_DELTAS_QUERY: &str = "
            SELECT url, end_rss - start_rss as memory_used
            FROM Logs
            ORDER BY memory_used DESC
            LIMIT $1
            ";
pub const SUM_MEMORY_DELTA_QUERY: &str = "SELECT SUM(end_rss - start_rss) FROM Logs";
