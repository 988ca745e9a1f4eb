//! Apache access log lines in combined log format.

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;

use super::{pick, pick_copy, EventSource, GeneratorOptions};
use crate::event::Event;
use crate::format::format_apache_timestamp;
use crate::pools::Pools;

pub const SOURCETYPE: &str = "access_combined";
const SOURCE: &str = "/var/log/httpd/access_log";
const INDEX: &str = "web";
const DEFAULT_HOST: &str = "web-01";

/// Request methods, three parts GET to one part each of the rest.
const METHODS: [&str; 6] = ["GET", "GET", "GET", "POST", "PUT", "DELETE"];

/// Outcomes of a login POST.
const LOGIN_STATUSES: [u16; 6] = [200, 200, 200, 401, 401, 403];

/// Outcomes of any other request.
const GENERAL_STATUSES: [u16; 10] = [200, 200, 200, 200, 200, 201, 301, 400, 404, 500];

/// Probability that a request carries no authenticated user.
const ANONYMOUS_PROBABILITY: f64 = 0.85;

/// Generates web server access log events.
#[derive(Debug, Clone)]
pub struct WebAccessGenerator {
    host: String,
    region: String,
    pools: Arc<Pools>,
}

impl WebAccessGenerator {
    pub fn new(options: &GeneratorOptions, pools: Arc<Pools>) -> Self {
        Self {
            host: options.host_or(DEFAULT_HOST),
            region: options.region_or_default(),
            pools,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Pick a status code for a request.
    ///
    /// Health checks always succeed. A login POST succeeds half of the time
    /// and is otherwise rejected; everything else draws from a general mix
    /// dominated by 200.
    pub fn status_for<R: Rng>(rng: &mut R, path: &str, method: &str) -> u16 {
        if path.contains("health") {
            return 200;
        }
        if path.contains("login") && method == "POST" {
            return pick_copy(rng, &LOGIN_STATUSES, 200);
        }
        pick_copy(rng, &GENERAL_STATUSES, 200)
    }

    /// Response size: a full body on 200, a short error page otherwise.
    fn bytes_for<R: Rng>(rng: &mut R, status: u16) -> u32 {
        if status == 200 {
            rng.gen_range(100..=50_000)
        } else {
            rng.gen_range(50..=500)
        }
    }
}

impl EventSource for WebAccessGenerator {
    fn generate_with<R: Rng>(&mut self, rng: &mut R) -> Event {
        let now = Utc::now();
        let pools = &self.pools;

        let clientip = pick(rng, pools.addresses(&self.region));
        let method = pick_copy(rng, &METHODS, "GET");
        let path = pick(rng, pools.paths());
        let status = Self::status_for(rng, path, method);
        let bytes = Self::bytes_for(rng, status);
        let user = if rng.gen_bool(ANONYMOUS_PROBABILITY) {
            "-"
        } else {
            pick(rng, pools.privileged_users())
        };
        let useragent = pick(rng, pools.user_agents());

        let raw = format!(
            "{} - {} [{}] \"{} {} HTTP/1.1\" {} {} \"https://app.example.com{}\" \"{}\"",
            clientip,
            user,
            format_apache_timestamp(&now),
            method,
            path,
            status,
            bytes,
            path,
            useragent
        );

        Event::new(now, raw, self.host.as_str(), SOURCE, SOURCETYPE, INDEX)
            .with_field("clientip", clientip)
            .with_field("method", method)
            .with_field("uri_path", path)
            .with_field("status", status)
            .with_field("bytes", bytes)
            .with_field("user", user)
            .with_field("useragent", useragent)
            .with_field("region", self.region.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pools::Region;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn generator(region: &str) -> WebAccessGenerator {
        WebAccessGenerator::new(
            &GeneratorOptions::new().host("edge-01").region(region),
            Pools::shared(),
        )
    }

    #[test]
    fn test_defaults() {
        let generator = WebAccessGenerator::new(&GeneratorOptions::default(), Pools::shared());
        assert_eq!(generator.host(), "web-01");
        assert_eq!(generator.region(), "us");
    }

    #[test]
    fn test_envelope() {
        let mut rng = StdRng::seed_from_u64(1);
        let event = generator("us").generate_with(&mut rng);

        assert_eq!(event.host, "edge-01");
        assert_eq!(event.source, "/var/log/httpd/access_log");
        assert_eq!(event.sourcetype, "access_combined");
        assert_eq!(event.index, "web");
        assert_eq!(event.field_str("region"), Some("us"));
    }

    #[test]
    fn test_health_path_always_200() {
        let mut rng = StdRng::seed_from_u64(2);
        for method in ["GET", "POST", "PUT", "DELETE"] {
            for _ in 0..50 {
                assert_eq!(WebAccessGenerator::status_for(&mut rng, "/health", method), 200);
            }
        }

        let mut generator = generator("us");
        let mut seen_health = 0;
        for _ in 0..2_000 {
            let event = generator.generate_with(&mut rng);
            if event.field_str("uri_path").unwrap().contains("health") {
                seen_health += 1;
                assert_eq!(event.field("status").unwrap().as_u64(), Some(200));
            }
        }
        assert!(seen_health > 0);
    }

    #[test]
    fn test_login_post_statuses() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let status = WebAccessGenerator::status_for(&mut rng, "/api/auth/login", "POST");
            assert!([200, 401, 403].contains(&status));
        }
    }

    #[test]
    fn test_general_statuses() {
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..200 {
            let status = WebAccessGenerator::status_for(&mut rng, "/api/users", "GET");
            assert!(GENERAL_STATUSES.contains(&status));
        }
    }

    #[test]
    fn test_bytes_correlate_with_status() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut generator = generator("eu");
        for _ in 0..500 {
            let event = generator.generate_with(&mut rng);
            let status = event.field("status").unwrap().as_u64().unwrap();
            let bytes = event.field("bytes").unwrap().as_u64().unwrap();
            if status == 200 {
                assert!((100..=50_000).contains(&bytes));
            } else {
                assert!((50..=500).contains(&bytes));
            }
        }
    }

    #[test]
    fn test_addresses_come_from_region_pool() {
        let pools = Pools::standard();
        let mut rng = StdRng::seed_from_u64(6);

        for region in Region::all() {
            let mut generator = generator(region.name());
            for _ in 0..100 {
                let event = generator.generate_with(&mut rng);
                let ip = event.field_str("clientip").unwrap().to_string();
                assert!(pools.addresses(region.name()).contains(&ip));
            }
        }
    }

    #[test]
    fn test_unknown_region_uses_us_pool() {
        let pools = Pools::standard();
        let mut rng = StdRng::seed_from_u64(7);
        let mut generator = generator("antarctica");

        for _ in 0..100 {
            let event = generator.generate_with(&mut rng);
            let ip = event.field_str("clientip").unwrap().to_string();
            assert!(pools.addresses("us").contains(&ip));
            assert_eq!(event.field_str("region"), Some("antarctica"));
        }
    }

    #[test]
    fn test_user_is_anonymous_or_privileged() {
        let pools = Pools::standard();
        let mut rng = StdRng::seed_from_u64(8);
        let mut generator = generator("us");
        let mut anonymous = 0;

        for _ in 0..1_000 {
            let event = generator.generate_with(&mut rng);
            let user = event.field_str("user").unwrap().to_string();
            if user == "-" {
                anonymous += 1;
            } else {
                assert!(pools.privileged_users().contains(&user));
            }
        }
        assert!(anonymous > 750 && anonymous < 950);
    }

    #[test]
    fn test_raw_is_rendered_from_fields() {
        let mut rng = StdRng::seed_from_u64(9);
        let event = generator("apac").generate_with(&mut rng);

        let ip = event.field_str("clientip").unwrap();
        let user = event.field_str("user").unwrap();
        let method = event.field_str("method").unwrap();
        let path = event.field_str("uri_path").unwrap();
        let status = event.field("status").unwrap();
        let bytes = event.field("bytes").unwrap();
        let agent = event.field_str("useragent").unwrap();

        assert!(event.raw.starts_with(&format!("{} - {} [", ip, user)));
        assert!(event
            .raw
            .contains(&format!("\"{} {} HTTP/1.1\" {} {} ", method, path, status, bytes)));
        assert!(event
            .raw
            .ends_with(&format!("\"https://app.example.com{}\" \"{}\"", path, agent)));
    }
}
