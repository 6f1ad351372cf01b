use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Which front door delivered the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrontDoor {
    #[default]
    ApiGateway,
    LoadBalancer,
}

impl FromStr for FrontDoor {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "api-gateway" | "apigateway" | "gateway" => Ok(FrontDoor::ApiGateway),
            "load-balancer" | "loadbalancer" | "alb" => Ok(FrontDoor::LoadBalancer),
            _ => Err(anyhow::anyhow!("Invalid front door: {}", s)),
        }
    }
}

impl Display for FrontDoor {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FrontDoor::ApiGateway => write!(f, "api-gateway"),
            FrontDoor::LoadBalancer => write!(f, "load-balancer"),
        }
    }
}

/// One inbound request as seen by the pipeline.
///
/// Header names are stored lowercased.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InboundEvent {
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
    pub front_door: FrontDoor,
}

impl InboundEvent {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_front_door(mut self, front_door: FrontDoor) -> Self {
        self.front_door = front_door;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Whether the `Accept` header allows WebP.
    pub fn accepts_webp(&self) -> bool {
        self.header("accept")
            .is_some_and(|accept| accept.to_ascii_lowercase().contains("image/webp"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let event = InboundEvent::new("/x").with_header("Accept", "image/webp,*/*");
        assert_eq!(event.header("ACCEPT"), Some("image/webp,*/*"));
        assert!(event.accepts_webp());
        assert!(!InboundEvent::new("/x").accepts_webp());
    }

    #[test]
    fn test_front_door_parse() {
        assert_eq!("ALB".parse::<FrontDoor>().unwrap(), FrontDoor::LoadBalancer);
        assert_eq!(
            "api-gateway".parse::<FrontDoor>().unwrap(),
            FrontDoor::ApiGateway
        );
        assert!("cdn".parse::<FrontDoor>().is_err());
    }
}
