// ABOUTME: Signature collection shared by forms, contracts and sign requests
// ABOUTME: One completion rule, three storage adapters, plus sign-request and contract signing operations

use chrono::{DateTime, Utc};
use std::fmt::Display;
use tracing::{info, warn};

use estately_core::types::{
    Contract, ContractStatus, FormSubmission, ParentType, ParticipantRole, RequiredSigner,
    SignRequest, SignRequestStatus, SignatureRecord,
};
use estately_core::SignatureEntry;
use estately_storage::Query;

use crate::error::{WorkflowError, WorkflowResult};
use crate::Workflow;

/// An adoption signature: an opaque image plus when and where it was given
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureInput {
    /// Data URL or object-store URL of the signature image
    pub url: String,
    pub ip_address: Option<String>,
}

impl SignatureInput {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ip_address: None,
        }
    }
}

/// Anything that collects signatures from a set of required parties
pub trait SigningCollector {
    type Party: PartialEq + Clone + Display;

    /// Whether a collector with nobody to sign counts as complete
    const EMPTY_IS_COMPLETE: bool = true;

    fn required_parties(&self) -> Vec<Self::Party>;

    fn signed_parties(&self) -> Vec<Self::Party>;

    fn record(
        &mut self,
        party: &Self::Party,
        input: &SignatureInput,
        at: DateTime<Utc>,
    ) -> WorkflowResult<()>;

    fn revoke(&mut self, party: &Self::Party);
}

/// Complete iff every required party has signed
pub fn is_complete<C: SigningCollector>(collector: &C) -> bool {
    let required = collector.required_parties();
    if required.is_empty() {
        return C::EMPTY_IS_COMPLETE;
    }
    let signed = collector.signed_parties();
    required.iter().all(|party| signed.contains(party))
}

impl SigningCollector for FormSubmission {
    type Party = ParticipantRole;

    fn required_parties(&self) -> Vec<ParticipantRole> {
        self.meta.required_roles()
    }

    fn signed_parties(&self) -> Vec<ParticipantRole> {
        self.meta.signed_roles()
    }

    fn record(
        &mut self,
        party: &ParticipantRole,
        input: &SignatureInput,
        at: DateTime<Utc>,
    ) -> WorkflowResult<()> {
        if input.url.trim().is_empty() {
            return Err(WorkflowError::Validation("Signature image is empty".to_string()));
        }
        if !self.meta.set_signature(*party, SignatureEntry::new(input.url.clone(), at)) {
            return Err(WorkflowError::Validation(format!(
                "Role {} cannot sign forms",
                party
            )));
        }
        Ok(())
    }

    fn revoke(&mut self, party: &ParticipantRole) {
        self.meta.clear_signature(*party);
    }
}

impl SigningCollector for Contract {
    type Party = String;

    // An unassigned contract has nobody to sign it and stays pending
    const EMPTY_IS_COMPLETE: bool = false;

    fn required_parties(&self) -> Vec<String> {
        self.assignees.clone()
    }

    fn signed_parties(&self) -> Vec<String> {
        self.signed_by.clone()
    }

    fn record(&mut self, party: &String, input: &SignatureInput, _at: DateTime<Utc>) -> WorkflowResult<()> {
        if !self.assignees.contains(party) {
            return Err(WorkflowError::PermissionDenied(format!(
                "{} is not an assignee of contract {}",
                party, self.id
            )));
        }
        if input.url.trim().is_empty() {
            return Err(WorkflowError::Validation("Signature image is empty".to_string()));
        }
        if !self.signed_by.contains(party) {
            self.signed_by.push(party.clone());
        }
        self.signature_data.insert(party.clone(), input.url.clone());
        Ok(())
    }

    fn revoke(&mut self, party: &String) {
        self.signed_by.retain(|id| id != party);
        self.signature_data.remove(party);
    }
}

impl SigningCollector for SignRequest {
    type Party = String;

    fn required_parties(&self) -> Vec<String> {
        self.required_signers
            .iter()
            .map(|s| s.profile_id.clone())
            .collect()
    }

    fn signed_parties(&self) -> Vec<String> {
        self.required_signers
            .iter()
            .filter(|s| s.signed)
            .map(|s| s.profile_id.clone())
            .collect()
    }

    fn record(&mut self, party: &String, input: &SignatureInput, at: DateTime<Utc>) -> WorkflowResult<()> {
        let signer = self
            .required_signers
            .iter_mut()
            .find(|s| &s.profile_id == party)
            .ok_or_else(|| {
                WorkflowError::Validation(format!(
                    "{} is not a required signer of sign request {}",
                    party, self.id
                ))
            })?;
        if input.url.trim().is_empty() {
            return Err(WorkflowError::Validation("Signature image is empty".to_string()));
        }
        signer.signed = true;
        signer.signed_at = Some(at);
        self.signature_data.insert(
            party.clone(),
            SignatureRecord {
                url: input.url.clone(),
                timestamp: at.to_rfc3339(),
                ip_address: input.ip_address.clone(),
            },
        );
        Ok(())
    }

    fn revoke(&mut self, party: &String) {
        for signer in self.required_signers.iter_mut().filter(|s| &s.profile_id == party) {
            signer.signed = false;
            signer.signed_at = None;
        }
        self.signature_data.remove(party);
    }
}

/// Derive a sign request's status from its signer list
fn sign_request_status(request: &SignRequest) -> SignRequestStatus {
    if is_complete(request) {
        SignRequestStatus::Completed
    } else {
        SignRequestStatus::Pending
    }
}

/// Derive a contract's status from its signer list
pub(crate) fn contract_status(contract: &Contract) -> ContractStatus {
    if is_complete(contract) {
        ContractStatus::Signed
    } else {
        ContractStatus::PendingSignature
    }
}

impl Workflow {
    // -----------------------------------------------------------------------
    // Sign requests
    // -----------------------------------------------------------------------

    pub async fn create_sign_request(
        &self,
        parent_id: &str,
        parent_type: ParentType,
        project_id: &str,
        signers: &[String],
    ) -> WorkflowResult<SignRequest> {
        let mut required_signers: Vec<RequiredSigner> = Vec::new();
        for profile_id in signers.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
            if !required_signers.iter().any(|s| s.profile_id == profile_id) {
                required_signers.push(RequiredSigner {
                    profile_id: profile_id.to_string(),
                    ..Default::default()
                });
            }
        }
        if required_signers.is_empty() {
            return Err(WorkflowError::Validation(
                "A sign request needs at least one signer".to_string(),
            ));
        }

        self.stores.projects.get(project_id).await?;

        let request = self
            .stores
            .sign_requests
            .create(SignRequest {
                parent_id: parent_id.to_string(),
                parent_type,
                project_id: project_id.to_string(),
                status: SignRequestStatus::Pending,
                required_signers,
                ..Default::default()
            })
            .await?;

        info!(
            sign_request_id = %request.id,
            project_id = %project_id,
            signers = request.required_signers.len(),
            "Created sign request"
        );
        Ok(request)
    }

    pub async fn add_signature(
        &self,
        id: &str,
        profile_id: &str,
        input: SignatureInput,
    ) -> WorkflowResult<SignRequest> {
        let mut request = self.stores.sign_requests.get(id).await?;
        if request.status.is_terminal() {
            return Err(WorkflowError::transition(
                "sign request",
                request.status,
                SignRequestStatus::Completed,
            ));
        }

        request.record(&profile_id.to_string(), &input, Utc::now())?;
        request.status = sign_request_status(&request);
        let saved = self.stores.sign_requests.save(&request).await?;

        info!(
            sign_request_id = %id,
            profile_id = %profile_id,
            status = %saved.status,
            "Recorded signature"
        );
        Ok(saved)
    }

    pub async fn remove_signature(&self, id: &str, profile_id: &str) -> WorkflowResult<SignRequest> {
        let mut request = self.stores.sign_requests.get(id).await?;
        if request.status.is_terminal() {
            return Err(WorkflowError::transition(
                "sign request",
                request.status,
                SignRequestStatus::Pending,
            ));
        }

        request.revoke(&profile_id.to_string());
        request.status = sign_request_status(&request);
        let saved = self.stores.sign_requests.save(&request).await?;

        info!(sign_request_id = %id, profile_id = %profile_id, "Removed signature");
        Ok(saved)
    }

    pub async fn reject_sign_request(&self, id: &str) -> WorkflowResult<SignRequest> {
        self.close_sign_request(id, SignRequestStatus::Rejected).await
    }

    pub async fn expire_sign_request(&self, id: &str) -> WorkflowResult<SignRequest> {
        self.close_sign_request(id, SignRequestStatus::Expired).await
    }

    async fn close_sign_request(
        &self,
        id: &str,
        target: SignRequestStatus,
    ) -> WorkflowResult<SignRequest> {
        let mut request = self.stores.sign_requests.get(id).await?;
        if request.status != SignRequestStatus::Pending {
            return Err(WorkflowError::transition("sign request", request.status, target));
        }
        request.status = target;
        let saved = self.stores.sign_requests.save(&request).await?;
        info!(sign_request_id = %id, status = %target, "Closed sign request");
        Ok(saved)
    }

    pub async fn project_sign_requests(&self, project_id: &str) -> WorkflowResult<Vec<SignRequest>> {
        let query = Query::new().eq("project_id", project_id);
        Ok(self.stores.sign_requests.list(&query).await?)
    }

    pub async fn parent_sign_requests(
        &self,
        parent_id: &str,
        parent_type: ParentType,
    ) -> WorkflowResult<Vec<SignRequest>> {
        let parent_type = serde_json::to_value(parent_type)
            .map_err(|e| WorkflowError::Validation(e.to_string()))?;
        let query = Query::new()
            .eq("parent_id", parent_id)
            .eq("parent_type", parent_type);
        Ok(self.stores.sign_requests.list(&query).await?)
    }

    // -----------------------------------------------------------------------
    // Contracts
    // -----------------------------------------------------------------------

    pub async fn sign_contract(
        &self,
        id: &str,
        profile_id: &str,
        image: &str,
    ) -> WorkflowResult<Contract> {
        let mut contract = self.stores.contracts.get(id).await?;
        if matches!(
            contract.status,
            ContractStatus::Executed | ContractStatus::Cancelled
        ) {
            return Err(WorkflowError::transition(
                "contract",
                contract.status,
                ContractStatus::Signed,
            ));
        }

        contract.record(&profile_id.to_string(), &SignatureInput::new(image), Utc::now())?;
        contract.status = contract_status(&contract);
        let saved = self.stores.contracts.save(&contract).await?;

        info!(
            contract_id = %id,
            profile_id = %profile_id,
            status = %saved.status,
            "Contract signed"
        );
        Ok(saved)
    }

    pub async fn undo_contract_signature(&self, id: &str, profile_id: &str) -> WorkflowResult<Contract> {
        let mut contract = self.stores.contracts.get(id).await?;
        if contract.status == ContractStatus::Executed {
            return Err(WorkflowError::transition(
                "contract",
                contract.status,
                ContractStatus::PendingSignature,
            ));
        }
        if !contract.signed_by.iter().any(|p| p == profile_id) {
            warn!(contract_id = %id, profile_id = %profile_id, "No signature to undo");
        }

        contract.revoke(&profile_id.to_string());
        if contract.status != ContractStatus::Cancelled {
            contract.status = contract_status(&contract);
        }
        let saved = self.stores.contracts.save(&contract).await?;
        info!(contract_id = %id, profile_id = %profile_id, "Contract signature undone");
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use estately_core::FormMeta;
    use pretty_assertions::assert_eq;

    fn sign_request(signers: &[&str]) -> SignRequest {
        SignRequest {
            id: "sr1".to_string(),
            required_signers: signers
                .iter()
                .map(|id| RequiredSigner {
                    profile_id: id.to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_sign_request_completion_tracks_signers() {
        let mut request = sign_request(&["s", "b"]);
        let now = Utc::now();
        assert!(!is_complete(&request));

        request.record(&"s".to_string(), &SignatureInput::new("data:s"), now).unwrap();
        assert!(!is_complete(&request));

        request.record(&"b".to_string(), &SignatureInput::new("data:b"), now).unwrap();
        assert!(is_complete(&request));
        assert_eq!(sign_request_status(&request), SignRequestStatus::Completed);

        request.revoke(&"s".to_string());
        assert!(!is_complete(&request));
        assert!(!request.signature_data.contains_key("s"));
        assert_eq!(request.required_signers[0].signed_at, None);
    }

    #[test]
    fn test_sign_request_rejects_unknown_signer() {
        let mut request = sign_request(&["s"]);
        let err = request
            .record(&"intruder".to_string(), &SignatureInput::new("data:x"), Utc::now())
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
        assert!(request.signature_data.is_empty());
    }

    #[test]
    fn test_sign_request_rejects_empty_signature() {
        let mut request = sign_request(&["s"]);
        let err = request
            .record(&"s".to_string(), &SignatureInput::new("  "), Utc::now())
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
        assert!(!request.required_signers[0].signed);
        assert!(request.signature_data.is_empty());
        assert!(!is_complete(&request));
    }

    #[test]
    fn test_contract_without_assignees_never_completes() {
        let contract = Contract::default();
        assert!(!is_complete(&contract));
        assert_eq!(contract_status(&contract), ContractStatus::PendingSignature);
    }

    #[test]
    fn test_contract_signed_when_all_assignees_signed() {
        let mut contract = Contract {
            assignees: vec!["s".to_string(), "b".to_string()],
            ..Default::default()
        };
        let now = Utc::now();
        contract.record(&"b".to_string(), &SignatureInput::new("data:b"), now).unwrap();
        contract.record(&"b".to_string(), &SignatureInput::new("data:b2"), now).unwrap();
        assert_eq!(contract.signed_by, vec!["b".to_string()]);
        assert_eq!(contract_status(&contract), ContractStatus::PendingSignature);

        contract.record(&"s".to_string(), &SignatureInput::new("data:s"), now).unwrap();
        assert_eq!(contract_status(&contract), ContractStatus::Signed);

        let err = contract
            .record(&"x".to_string(), &SignatureInput::new("data:x"), now)
            .unwrap_err();
        assert!(matches!(err, WorkflowError::PermissionDenied(_)));
    }

    #[test]
    fn test_form_without_required_roles_is_complete() {
        let form = FormSubmission::default();
        assert!(is_complete(&form));

        let mut form = FormSubmission {
            meta: FormMeta::new(true, false),
            ..Default::default()
        };
        assert!(!is_complete(&form));
        form.record(&ParticipantRole::Seller, &SignatureInput::new("data:s"), Utc::now())
            .unwrap();
        assert!(is_complete(&form));
        assert!(form
            .record(&ParticipantRole::Admin, &SignatureInput::new("data:a"), Utc::now())
            .is_err());
    }
}
