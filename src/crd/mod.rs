pub mod admission_policy;
pub mod admission_policy_group;
pub mod cluster_admission_policy;
pub mod cluster_admission_policy_group;
pub mod policy;

pub use admission_policy::{AdmissionPolicy, AdmissionPolicySpec};
pub use admission_policy_group::{AdmissionPolicyGroup, AdmissionPolicyGroupSpec};
pub use cluster_admission_policy::{ClusterAdmissionPolicy, ClusterAdmissionPolicySpec};
pub use cluster_admission_policy_group::{
    ClusterAdmissionPolicyGroup, ClusterAdmissionPolicyGroupSpec,
};
pub use policy::{Policy, PolicyGroup, PolicyGroupMember, PolicyPhase, PolicyScope, PolicyStatus};
