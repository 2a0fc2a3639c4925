//! Object construction for a server workload.

use std::collections::BTreeMap;

use k8s_openapi::ByteString;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, DeploymentStrategy};
use k8s_openapi::api::core::v1::{
    Affinity, ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, EnvVar, EnvVarSource, ExecAction, KeyToPath,
    NodeAffinity, NodeSelectorRequirement, NodeSelectorTerm, PersistentVolumeClaim, PersistentVolumeClaimSpec,
    PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec, PreferredSchedulingTerm, Probe, ResourceRequirements,
    Secret, SecretKeySelector, Service, ServicePort, ServiceSpec, Volume, VolumeMount, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;

use super::{WorkloadNames, WorkloadObject};
use crate::config::ServerTemplate;

pub const MYSQL_PORT: u16 = 3306;
pub const ROOT_PASSWORD_KEY: &str = "ROOT_PASSWORD";
pub const CONFIG_FILE_KEY: &str = "mysql.cnf";
const APP_LABEL: &str = "app";
const CONFIG_VOLUME: &str = "config-volume";
const DATA_VOLUME: &str = "mysql-persistent-storage";

/// Inputs that vary per server
#[derive(Debug, Clone, Copy)]
pub struct WorkloadSpec<'a> {
    pub name: &'a str,
    pub root_password: &'a str,
    pub zone: Option<&'a str>,
}

/// Build every object for a server, in apply order: Secret, ConfigMap, PersistentVolumeClaim,
/// Deployment, Service.
pub fn server_workload(spec: WorkloadSpec<'_>, template: &ServerTemplate) -> Vec<WorkloadObject> {
    let names = WorkloadNames::for_server(spec.name);
    vec![
        secret(&names, spec),
        config_map(&names, spec, template),
        volume_claim(&names, spec, template),
        deployment(&names, spec, template),
        service(&names, spec),
    ]
}

fn labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(APP_LABEL.to_string(), name.to_string())])
}

fn metadata(name: &str, server: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        labels: Some(labels(server)),
        ..Default::default()
    }
}

fn quantities(cpu: &str, memory: &str) -> BTreeMap<String, Quantity> {
    BTreeMap::from([
        ("cpu".to_string(), Quantity(cpu.to_string())),
        ("memory".to_string(), Quantity(memory.to_string())),
    ])
}

fn secret(names: &WorkloadNames, spec: WorkloadSpec<'_>) -> WorkloadObject {
    // `data` is serialized base64-encoded
    WorkloadObject::Secret(Secret {
        metadata: metadata(&names.secret, spec.name),
        type_: Some("Opaque".to_string()),
        data: Some(BTreeMap::from([(
            ROOT_PASSWORD_KEY.to_string(),
            ByteString(spec.root_password.as_bytes().to_vec()),
        )])),
        ..Default::default()
    })
}

fn config_map(names: &WorkloadNames, spec: WorkloadSpec<'_>, template: &ServerTemplate) -> WorkloadObject {
    WorkloadObject::ConfigMap(ConfigMap {
        metadata: metadata(&names.config_map, spec.name),
        data: Some(BTreeMap::from([(
            CONFIG_FILE_KEY.to_string(),
            template.engine_config.clone(),
        )])),
        ..Default::default()
    })
}

fn volume_claim(names: &WorkloadNames, spec: WorkloadSpec<'_>, template: &ServerTemplate) -> WorkloadObject {
    WorkloadObject::PersistentVolumeClaim(PersistentVolumeClaim {
        metadata: metadata(&names.volume_claim, spec.name),
        spec: Some(PersistentVolumeClaimSpec {
            storage_class_name: Some(template.storage_class.clone()),
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(template.storage_size.clone()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    })
}

fn prefer_nodes(weight: i32, key: &str, value: &str) -> PreferredSchedulingTerm {
    PreferredSchedulingTerm {
        weight,
        preference: NodeSelectorTerm {
            match_expressions: Some(vec![NodeSelectorRequirement {
                key: key.to_string(),
                operator: "In".to_string(),
                values: Some(vec![value.to_string()]),
            }]),
            match_fields: None,
        },
    }
}

/// Soft preference for database nodes, and for the requested zone when one is given
fn affinity(spec: WorkloadSpec<'_>, template: &ServerTemplate) -> Affinity {
    let mut preferred = vec![prefer_nodes(100, &template.role_label, "true")];
    if let Some(zone) = spec.zone {
        preferred.push(prefer_nodes(50, &template.zone_label, zone));
    }
    Affinity {
        node_affinity: Some(NodeAffinity {
            preferred_during_scheduling_ignored_during_execution: Some(preferred),
            required_during_scheduling_ignored_during_execution: None,
        }),
        ..Default::default()
    }
}

fn mysqladmin_ping() -> Probe {
    Probe {
        exec: Some(ExecAction {
            command: Some(vec![
                "sh".to_string(),
                "-c".to_string(),
                "mysqladmin ping -h 127.0.0.1 -uroot -p\"$MYSQL_ROOT_PASSWORD\"".to_string(),
            ]),
        }),
        initial_delay_seconds: Some(30),
        period_seconds: Some(10),
        timeout_seconds: Some(5),
        ..Default::default()
    }
}

fn deployment(names: &WorkloadNames, spec: WorkloadSpec<'_>, template: &ServerTemplate) -> WorkloadObject {
    let container = Container {
        name: "mysql".to_string(),
        image: Some(template.image.clone()),
        resources: Some(ResourceRequirements {
            limits: Some(quantities(&template.cpu_limit, &template.memory_limit)),
            requests: Some(quantities(&template.cpu_request, &template.memory_request)),
            ..Default::default()
        }),
        env: Some(vec![EnvVar {
            name: "MYSQL_ROOT_PASSWORD".to_string(),
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: names.secret.clone().into(),
                    key: ROOT_PASSWORD_KEY.to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]),
        ports: Some(vec![ContainerPort {
            container_port: i32::from(MYSQL_PORT),
            name: Some("mysql".to_string()),
            ..Default::default()
        }]),
        liveness_probe: Some(mysqladmin_ping()),
        readiness_probe: Some(mysqladmin_ping()),
        volume_mounts: Some(vec![
            VolumeMount {
                name: CONFIG_VOLUME.to_string(),
                mount_path: "/etc/mysql/conf.d/".to_string(),
                ..Default::default()
            },
            VolumeMount {
                name: DATA_VOLUME.to_string(),
                mount_path: "/var/lib/mysql".to_string(),
                ..Default::default()
            },
        ]),
        ..Default::default()
    };

    let volumes = vec![
        Volume {
            name: CONFIG_VOLUME.to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: names.config_map.clone().into(),
                items: Some(vec![KeyToPath {
                    key: CONFIG_FILE_KEY.to_string(),
                    path: CONFIG_FILE_KEY.to_string(),
                    mode: None,
                }]),
                ..Default::default()
            }),
            ..Default::default()
        },
        Volume {
            name: DATA_VOLUME.to_string(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: names.volume_claim.clone(),
                read_only: None,
            }),
            ..Default::default()
        },
    ];

    WorkloadObject::Deployment(Deployment {
        metadata: metadata(&names.deployment, spec.name),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(labels(spec.name)),
                match_expressions: None,
            },
            // ReadWriteOnce data volume: the old pod stops before the new one starts
            strategy: Some(DeploymentStrategy {
                type_: Some("Recreate".to_string()),
                rolling_update: None,
            }),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels(spec.name)),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    affinity: Some(affinity(spec, template)),
                    containers: vec![container],
                    volumes: Some(volumes),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    })
}

fn service(names: &WorkloadNames, spec: WorkloadSpec<'_>) -> WorkloadObject {
    WorkloadObject::Service(Service {
        metadata: metadata(&names.service, spec.name),
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                name: Some("mysql".to_string()),
                port: i32::from(MYSQL_PORT),
                target_port: Some(IntOrString::Int(i32::from(MYSQL_PORT))),
                ..Default::default()
            }]),
            selector: Some(labels(spec.name)),
            ..Default::default()
        }),
        status: None,
    })
}
