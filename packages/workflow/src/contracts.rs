// ABOUTME: Contract generation and admin contract actions
// ABOUTME: Fills template placeholders from project data; unlock, visibility and delete

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::info;

use estately_core::constants::HANDOVER_DATE_UNKNOWN;
use estately_core::render_placeholders;
use estately_core::types::{
    Agency, Contract, ContractStatus, ContractTemplate, ParticipantRole, Profile, Project,
    Property, Viewer, Visibility,
};
use estately_storage::Query;

use crate::error::{WorkflowError, WorkflowResult};
use crate::{require_admin, Workflow};

/// Everything a contract template can refer to
#[derive(Debug, Clone, Default)]
pub struct PlaceholderContext {
    pub project: Project,
    pub property: Option<Property>,
    pub agency: Option<Agency>,
    pub seller: Option<Profile>,
    pub buyer: Option<Profile>,
    pub agent: Option<Profile>,
    pub today: DateTime<Utc>,
}

fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.format("%d-%m-%Y").to_string())
        .unwrap_or_else(|| HANDOVER_DATE_UNKNOWN.to_string())
}

fn format_price(price: Option<f64>) -> String {
    match price {
        Some(p) if p.fract() == 0.0 => format!("{:.0}", p),
        Some(p) => format!("{:.2}", p),
        None => String::new(),
    }
}

fn insert_party(values: &mut HashMap<String, String>, prefix: &str, profile: Option<&Profile>) {
    let get = |f: fn(&Profile) -> Option<&String>| {
        profile.and_then(f).cloned().unwrap_or_default()
    };
    let fields = [
        ("name", profile.map(|p| p.name.clone()).unwrap_or_default()),
        ("first_name", get(|p| p.first_name.as_ref())),
        ("last_name", get(|p| p.last_name.as_ref())),
        ("birthday", get(|p| p.birthday.as_ref())),
        ("address", get(|p| p.address.as_ref())),
        ("placeofbirth", get(|p| p.birth_place.as_ref())),
        ("personal_identification_number", get(|p| p.id_number.as_ref())),
        ("vat", get(|p| p.vat_number.as_ref())),
        ("bank_account", get(|p| p.bank_account.as_ref())),
        ("phone", get(|p| p.phone.as_ref())),
        ("mail", get(|p| p.email.as_ref())),
    ];
    for (field, value) in fields {
        values.insert(format!("{}.{}", prefix, field), value);
    }
}

/// Lowercase placeholder keys and their values. Known keys without data map to "".
pub fn placeholder_values(ctx: &PlaceholderContext) -> HashMap<String, String> {
    let mut values = HashMap::new();

    insert_party(&mut values, "seller", ctx.seller.as_ref());
    insert_party(&mut values, "buyer", ctx.buyer.as_ref());

    let agent = ctx.agent.as_ref();
    values.insert("agent.name".into(), agent.map(|a| a.name.clone()).unwrap_or_default());
    values.insert("agent.phone".into(), agent.and_then(|a| a.phone.clone()).unwrap_or_default());
    values.insert("agent.mail".into(), agent.and_then(|a| a.email.clone()).unwrap_or_default());

    let agency = ctx.agency.as_ref();
    values.insert("agency.name".into(), agency.map(|a| a.name.clone()).unwrap_or_default());
    values.insert("agency.address".into(), agency.map(|a| a.address.clone()).unwrap_or_default());

    let property = ctx.property.as_ref();
    values.insert(
        "property.address".into(),
        property.map(|p| p.address.clone()).unwrap_or_default(),
    );
    values.insert(
        "property.price".into(),
        format_price(property.and_then(|p| p.price).or(ctx.project.price)),
    );

    let handover = ctx
        .project
        .handover_date
        .or_else(|| property.and_then(|p| p.handover_date));
    values.insert("project.handover_date".into(), format_date(handover));
    values.insert("property.handover_date".into(), format_date(handover));
    values.insert(
        "project.number".into(),
        ctx.project.id.chars().take(8).collect::<String>().to_uppercase(),
    );
    values.insert("current_date".into(), ctx.today.format("%d-%m-%Y").to_string());

    values
}

impl Workflow {
    /// Gather the project, its property, agency and participants for rendering
    pub async fn placeholder_context(&self, project: &Project) -> WorkflowResult<PlaceholderContext> {
        let property = match project.property_id.as_deref() {
            Some(id) => self.stores.properties.find(id).await?,
            None => None,
        };
        let agency = match project.agency_id.as_deref() {
            Some(id) => self.stores.agencies.find(id).await?,
            None => None,
        };
        let seller = match project.participant(ParticipantRole::Seller) {
            Some(id) => self.stores.profiles.find(id).await?,
            None => None,
        };
        let buyer = match project.participant(ParticipantRole::Buyer) {
            Some(id) => self.stores.profiles.find(id).await?,
            None => None,
        };
        let agent = match project.participant(ParticipantRole::Admin) {
            Some(id) => self.stores.profiles.find(id).await?,
            None => None,
        };

        Ok(PlaceholderContext {
            project: project.clone(),
            property,
            agency,
            seller,
            buyer,
            agent,
            today: Utc::now(),
        })
    }

    pub async fn render_template(
        &self,
        template: &ContractTemplate,
        project: &Project,
    ) -> WorkflowResult<String> {
        let ctx = self.placeholder_context(project).await?;
        Ok(render_placeholders(&template.content, &placeholder_values(&ctx)))
    }

    /// Generate a contract for `project` from `template`. Signers are the
    /// participants whose signature the template asks for.
    pub(crate) async fn create_contract(
        &self,
        template: &ContractTemplate,
        project: &Project,
    ) -> WorkflowResult<Contract> {
        let content = self.render_template(template, project).await?;
        let required_roles = template.flags.signature_roles();
        let assignees: Vec<String> = required_roles
            .iter()
            .filter_map(|role| project.participant(*role))
            .map(str::to_string)
            .collect();

        let contract = self
            .stores
            .contracts
            .create(Contract {
                title: template.title.clone(),
                content,
                project_id: project.id.clone(),
                status: ContractStatus::PendingSignature,
                assignees,
                visibility: template.flags.visibility,
                template_id: Some(template.id.clone()),
                required_roles,
                ..Default::default()
            })
            .await?;

        info!(
            contract_id = %contract.id,
            project_id = %project.id,
            template_id = %template.id,
            assignees = contract.assignees.len(),
            "Generated contract"
        );
        Ok(contract)
    }

    /// Admin override: clear every signature and put the contract back up for signing
    pub async fn unlock_contract(&self, id: &str, viewer: &Viewer) -> WorkflowResult<Contract> {
        require_admin(viewer, "unlock contracts")?;
        let mut contract = self.stores.contracts.get(id).await?;
        if contract.status == ContractStatus::Executed {
            return Err(WorkflowError::transition(
                "contract",
                contract.status,
                ContractStatus::PendingSignature,
            ));
        }

        contract.signed_by.clear();
        contract.signature_data.clear();
        contract.status = ContractStatus::PendingSignature;
        let saved = self.stores.contracts.save(&contract).await?;
        info!(contract_id = %id, "Contract unlocked");
        Ok(saved)
    }

    pub async fn set_contract_visibility(
        &self,
        id: &str,
        viewer: &Viewer,
        visibility: Visibility,
    ) -> WorkflowResult<Contract> {
        require_admin(viewer, "change contract visibility")?;
        let mut contract = self.stores.contracts.get(id).await?;
        contract.visibility = visibility;
        Ok(self.stores.contracts.save(&contract).await?)
    }

    pub async fn delete_contract(&self, id: &str, viewer: &Viewer) -> WorkflowResult<()> {
        require_admin(viewer, "delete contracts")?;
        self.stores.contracts.delete(id).await?;
        info!(contract_id = %id, "Contract deleted");
        Ok(())
    }

    pub async fn project_contracts(&self, project_id: &str) -> WorkflowResult<Vec<Contract>> {
        let query = Query::new().eq("project_id", project_id);
        Ok(self.stores.contracts.list(&query).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn context() -> PlaceholderContext {
        PlaceholderContext {
            project: Project {
                id: "abcdefghijk".to_string(),
                price: Some(350000.0),
                ..Default::default()
            },
            property: Some(Property {
                address: "Kerkstraat 1, Gent".to_string(),
                handover_date: Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).single(),
                ..Default::default()
            }),
            seller: Some(Profile {
                name: "Ann Peeters".to_string(),
                email: Some("ann@example.com".to_string()),
                ..Default::default()
            }),
            today: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
            ..Default::default()
        }
    }

    #[test]
    fn test_placeholder_values() {
        let values = placeholder_values(&context());
        assert_eq!(values["seller.name"], "Ann Peeters");
        assert_eq!(values["seller.mail"], "ann@example.com");
        assert_eq!(values["buyer.name"], "");
        assert_eq!(values["property.price"], "350000");
        assert_eq!(values["project.number"], "ABCDEFGH");
        assert_eq!(values["property.handover_date"], "01-03-2026");
        assert_eq!(values["current_date"], "15-01-2026");
    }

    #[test]
    fn test_handover_date_unknown() {
        let mut ctx = context();
        ctx.property = None;
        let values = placeholder_values(&ctx);
        assert_eq!(values["project.handover_date"], "TBD");
        assert_eq!(values["property.address"], "");
    }

    #[test]
    fn test_render_leaves_unknown_tokens() {
        let values = placeholder_values(&context());
        let rendered = render_placeholders(
            "Seller [SELLER.NAME] sells {{ property.address }} for [notary.fee]",
            &values,
        );
        assert_eq!(rendered, "Seller Ann Peeters sells Kerkstraat 1, Gent for [notary.fee]");
    }
}
