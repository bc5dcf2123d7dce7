//! Deployment configuration model

use crate::error::{ConfigError, Result};
use ecsflow_cloud::WaitConfig;
use serde::{Deserialize, Serialize};

/// Everything a run needs to know about the deployment.
///
/// Read once at startup and shared immutably for the whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    pub region: String,

    pub cluster_name: String,
    pub service_name: String,
    /// Task definition family the service runs (registered outside ecsflow)
    pub task_definition: String,
    /// Container in the task definition that receives load balancer traffic
    pub container_name: String,
    pub log_group: String,
    pub security_group_name: String,
    pub execution_role_name: String,
    pub execution_role_policy_arn: String,
    pub load_balancer_name: String,
    pub target_group_name: String,

    pub container_port: u16,
    pub listener_port: u16,
    pub health_check_path: String,
    /// CIDR allowed to reach the container and listener ports
    pub ingress_cidr: String,

    pub desired_count: u32,
    /// Number of default-VPC subnets the load balancer and service span
    pub subnet_count: usize,

    /// Readiness wait after create (role propagation, load balancer activation)
    pub settle: WaitConfig,
    /// Quiescing wait before delete (service drain, ENI release)
    pub drain: WaitConfig,
}

fn default_drain() -> WaitConfig {
    WaitConfig {
        initial_delay_ms: 2000,
        max_delay_ms: 15_000,
        multiplier: 2.0,
        timeout_secs: 300,
    }
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            cluster_name: "devops-cluster".to_string(),
            service_name: "devops-service".to_string(),
            task_definition: "devops-task".to_string(),
            container_name: "devops-app".to_string(),
            log_group: "/ecs/devops-task".to_string(),
            security_group_name: "devops-ecs-sg".to_string(),
            execution_role_name: "ecsTaskExecutionRole".to_string(),
            execution_role_policy_arn:
                "arn:aws:iam::aws:policy/service-role/AmazonECSTaskExecutionRolePolicy"
                    .to_string(),
            load_balancer_name: "devops-alb".to_string(),
            target_group_name: "devops-targets".to_string(),
            container_port: 3000,
            listener_port: 80,
            health_check_path: "/".to_string(),
            ingress_cidr: "0.0.0.0/0".to_string(),
            desired_count: 1,
            subnet_count: 2,
            settle: WaitConfig::default(),
            drain: default_drain(),
        }
    }
}

impl DeploymentConfig {
    /// Reject values no provider call could succeed with
    pub fn validate(&self) -> Result<()> {
        let names = [
            ("region", self.region.as_str()),
            ("cluster_name", self.cluster_name.as_str()),
            ("service_name", self.service_name.as_str()),
            ("task_definition", self.task_definition.as_str()),
            ("container_name", self.container_name.as_str()),
            ("log_group", self.log_group.as_str()),
            ("security_group_name", self.security_group_name.as_str()),
            ("execution_role_name", self.execution_role_name.as_str()),
            ("execution_role_policy_arn", self.execution_role_policy_arn.as_str()),
            ("load_balancer_name", self.load_balancer_name.as_str()),
            ("target_group_name", self.target_group_name.as_str()),
            ("health_check_path", self.health_check_path.as_str()),
        ];
        for (field, value) in names {
            if value.trim().is_empty() {
                return Err(ConfigError::invalid(field, "must not be empty"));
            }
        }

        if self.container_port == 0 {
            return Err(ConfigError::invalid("container_port", "must be 1-65535"));
        }
        if self.listener_port == 0 {
            return Err(ConfigError::invalid("listener_port", "must be 1-65535"));
        }
        if !self.health_check_path.starts_with('/') {
            return Err(ConfigError::invalid(
                "health_check_path",
                format!("'{}' must start with '/'", self.health_check_path),
            ));
        }

        validate_cidr(&self.ingress_cidr)?;

        if self.desired_count == 0 {
            return Err(ConfigError::invalid("desired_count", "must be at least 1"));
        }
        // an application load balancer needs two availability zones
        if self.subnet_count < 2 {
            return Err(ConfigError::invalid("subnet_count", "must be at least 2"));
        }
        validate_wait(
            &self.settle,
            ["settle.timeout_secs", "settle.initial_delay_ms", "settle.max_delay_ms"],
        )?;
        validate_wait(
            &self.drain,
            ["drain.timeout_secs", "drain.initial_delay_ms", "drain.max_delay_ms"],
        )?;

        Ok(())
    }

    /// Merge in command-line overrides
    pub fn with_region(mut self, region: Option<String>) -> Self {
        if let Some(region) = region {
            self.region = region;
        }
        self
    }
}

/// A zero delay would poll the provider back to back until the deadline
fn validate_wait(wait: &WaitConfig, [timeout, initial, max]: [&'static str; 3]) -> Result<()> {
    if wait.timeout_secs == 0 {
        return Err(ConfigError::invalid(timeout, "must be positive"));
    }
    if wait.initial_delay_ms == 0 {
        return Err(ConfigError::invalid(initial, "must be positive"));
    }
    if wait.max_delay_ms < wait.initial_delay_ms {
        return Err(ConfigError::invalid(
            max,
            format!("must be at least initial_delay_ms ({})", wait.initial_delay_ms),
        ));
    }
    Ok(())
}

fn validate_cidr(cidr: &str) -> Result<()> {
    let invalid = || ConfigError::invalid("ingress_cidr", format!("'{}' is not an IPv4 CIDR", cidr));

    let (addr, prefix) = cidr.split_once('/').ok_or_else(invalid)?;
    addr.parse::<std::net::Ipv4Addr>().map_err(|_| invalid())?;
    match prefix.parse::<u8>() {
        Ok(p) if p <= 32 => Ok(()),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = DeploymentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.container_port, 3000);
        assert_eq!(config.listener_port, 80);
        assert_eq!(config.drain.timeout_secs, 300);
    }

    #[test]
    fn test_empty_name_rejected() {
        let config = DeploymentConfig {
            cluster_name: " ".to_string(),
            ..Default::default()
        };
        match config.validate() {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "cluster_name"),
            other => panic!("expected invalid cluster_name, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_port_rejected() {
        let config = DeploymentConfig {
            listener_port: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cidr_validation() {
        assert!(validate_cidr("0.0.0.0/0").is_ok());
        assert!(validate_cidr("10.0.0.0/16").is_ok());
        assert!(validate_cidr("10.0.0.0").is_err());
        assert!(validate_cidr("10.0.0.0/33").is_err());
        assert!(validate_cidr("not-an-ip/8").is_err());
    }

    #[test]
    fn test_single_subnet_rejected() {
        let config = DeploymentConfig {
            subnet_count: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_poll_delays_rejected() {
        let config = DeploymentConfig {
            settle: WaitConfig {
                initial_delay_ms: 0,
                ..WaitConfig::default()
            },
            ..Default::default()
        };
        match config.validate() {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "settle.initial_delay_ms"),
            other => panic!("expected invalid settle.initial_delay_ms, got {other:?}"),
        }

        let config = DeploymentConfig {
            drain: WaitConfig {
                max_delay_ms: 0,
                ..default_drain()
            },
            ..Default::default()
        };
        match config.validate() {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "drain.max_delay_ms"),
            other => panic!("expected invalid drain.max_delay_ms, got {other:?}"),
        }
    }

    #[test]
    fn test_region_override() {
        let config = DeploymentConfig::default().with_region(Some("ap-northeast-1".into()));
        assert_eq!(config.region, "ap-northeast-1");

        let config = config.with_region(None);
        assert_eq!(config.region, "ap-northeast-1");
    }
}
