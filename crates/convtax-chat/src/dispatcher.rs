//! Intent dispatch: the side effect behind each recognized intent.
//!
//! Each intent maps to at most one mutation or lookup. The dispatcher
//! returns an override text when the reply must not come from the NLU agent.

use std::sync::Arc;

use tracing::{debug, info, warn};

use convtax_core::config::IntentConfig;
use convtax_core::error::ConvTaxError;
use convtax_core::types::{parse_exact_date, EndDate, NOT_SPECIFIED};
use convtax_nlu::response::PARAM_CONTRACT;
use convtax_nlu::{DetectIntentResponse, QueryParameters, StartDateParam};
use convtax_storage::{ContractRepository, Database, HistoryRepository, UserRepository};

use crate::error::ChatError;
use crate::explanation::ExplanationLookup;

/// Reply when the start date of a contract could not be changed.
pub const START_DATE_ERROR: &str =
    "Beim Ändern des Startdatums ist ein Fehler aufgetreten. Bitte versuche es erneut";
/// Reply when the end date of a contract could not be changed.
pub const END_DATE_ERROR: &str =
    "Beim Ändern des Enddatums ist ein Fehler aufgetreten. Bitte versuche es erneut";
/// Reply when a user asks for their contracts and has none.
pub const NO_CONTRACTS: &str = "Du hast noch keine Arbeitsverträge.";

/// The intents the dispatcher acts on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntentKind {
    CreateContract,
    SetStartDate,
    SetEndDateUnlimited,
    Help,
    Context,
    ListContracts,
    /// Anything else. The agent's own reply is used.
    Other,
}

impl IntentKind {
    /// Resolve a fully qualified intent name by exact match.
    pub fn resolve(intent_name: &str, intents: &IntentConfig) -> Self {
        let table = [
            (&intents.create_contract, IntentKind::CreateContract),
            (&intents.set_start_date, IntentKind::SetStartDate),
            (&intents.set_end_date_unlimited, IntentKind::SetEndDateUnlimited),
            (&intents.help, IntentKind::Help),
            (&intents.context, IntentKind::Context),
            (&intents.list_contracts, IntentKind::ListContracts),
        ];
        table
            .into_iter()
            .find(|(name, _)| name.as_str() == intent_name)
            .map(|(_, kind)| kind)
            .unwrap_or(IntentKind::Other)
    }
}

/// Performs the side effect of a recognized intent.
pub struct Dispatcher {
    users: UserRepository,
    contracts: ContractRepository,
    history: HistoryRepository,
    intents: IntentConfig,
    explanations: Arc<dyn ExplanationLookup>,
}

impl Dispatcher {
    pub fn new(
        db: Arc<Database>,
        intents: IntentConfig,
        explanations: Arc<dyn ExplanationLookup>,
    ) -> Self {
        Self {
            users: UserRepository::new(db.clone()),
            contracts: ContractRepository::new(db.clone()),
            history: HistoryRepository::new(db),
            intents,
            explanations,
        }
    }

    /// Run the side effect for `intent_name` and return the override text, if
    /// any. Storage failures outside the two date edits propagate.
    pub fn dispatch(
        &self,
        user_id: &str,
        intent_name: &str,
        response: &DetectIntentResponse,
    ) -> Result<Option<String>, ChatError> {
        let kind = IntentKind::resolve(intent_name, &self.intents);
        debug!(user_id = %user_id, intent = %intent_name, ?kind, "Dispatching intent");

        match kind {
            IntentKind::CreateContract => {
                self.create_contract(user_id)?;
                Ok(None)
            }
            IntentKind::SetStartDate => {
                if !response.all_required_params_present() {
                    debug!("Start date parameters incomplete, agent will ask");
                    return Ok(None);
                }
                match self.set_start_date(response.parameters()) {
                    Ok(()) => Ok(None),
                    Err(e) => {
                        warn!(user_id = %user_id, error = %e, "Failed to change start date");
                        Ok(Some(START_DATE_ERROR.to_string()))
                    }
                }
            }
            IntentKind::SetEndDateUnlimited => {
                let Some(contract_id) = response.parameters().and_then(|p| p.text(PARAM_CONTRACT))
                else {
                    debug!("Contract parameter missing, agent will ask");
                    return Ok(None);
                };
                match self.set_end_date_unlimited(contract_id) {
                    Ok(()) => Ok(None),
                    Err(e) => {
                        warn!(user_id = %user_id, error = %e, "Failed to change end date");
                        Ok(Some(END_DATE_ERROR.to_string()))
                    }
                }
            }
            IntentKind::Help => {
                let text = match self.previous_exchange(user_id)? {
                    Some((intent, action)) => {
                        self.explanations.help_text(&intent, action.as_deref())
                    }
                    None => self.explanations.nothing_to_explain(),
                };
                Ok(Some(text))
            }
            IntentKind::Context => {
                let text = match self.previous_exchange(user_id)? {
                    Some((intent, _)) => self.explanations.context_text(&intent),
                    None => self.explanations.nothing_to_explain(),
                };
                Ok(Some(text))
            }
            IntentKind::ListContracts => Ok(Some(self.list_contracts(user_id)?)),
            IntentKind::Other => Ok(None),
        }
    }

    fn create_contract(&self, user_id: &str) -> Result<(), ConvTaxError> {
        if self.users.ensure(user_id)? {
            info!(user_id = %user_id, "Created user");
        }
        let contract = self.contracts.create(user_id)?;
        info!(user_id = %user_id, contract_id = %contract.id, "Created employment contract");
        Ok(())
    }

    fn set_start_date(&self, parameters: Option<QueryParameters<'_>>) -> Result<(), ConvTaxError> {
        let parameters = parameters
            .ok_or_else(|| ConvTaxError::ContractNotFound("no parameters".to_string()))?;
        let contract_id = parameters
            .text(PARAM_CONTRACT)
            .ok_or_else(|| ConvTaxError::ContractNotFound(String::new()))?;
        let start = parameters
            .start_date()
            .ok_or_else(|| ConvTaxError::InvalidDate("missing start date".to_string()))?;

        let found = match start {
            StartDateParam::Exact(raw) => {
                let date = parse_exact_date(&raw)?;
                self.contracts.replace_start_date_exact(contract_id, date)?
            }
            StartDateParam::Phrase(text) => {
                self.contracts.replace_start_date_string(contract_id, &text)?
            }
        };
        if !found {
            return Err(ConvTaxError::ContractNotFound(contract_id.to_string()));
        }
        info!(contract_id = %contract_id, "Changed start date");
        Ok(())
    }

    fn set_end_date_unlimited(&self, contract_id: &str) -> Result<(), ConvTaxError> {
        if !self
            .contracts
            .edit_end_date_string(contract_id, EndDate::UNLIMITED)?
        {
            return Err(ConvTaxError::ContractNotFound(contract_id.to_string()));
        }
        info!(contract_id = %contract_id, "Set end date to unlimited");
        Ok(())
    }

    /// Intent and action of the latest exchange that was not itself a
    /// help, context or fallback request and had a recognized intent.
    fn previous_exchange(
        &self,
        user_id: &str,
    ) -> Result<Option<(String, Option<String>)>, ConvTaxError> {
        let mut excluded = self.intents.meta_intents();
        excluded.push(NOT_SPECIFIED.to_string());
        let entry = self.history.latest_excluding(user_id, &excluded)?;
        Ok(entry.map(|e| {
            let action = Some(e.action_name).filter(|a| a != NOT_SPECIFIED);
            (e.intent_name, action)
        }))
    }

    fn list_contracts(&self, user_id: &str) -> Result<String, ConvTaxError> {
        let contracts = self.contracts.list_for_user(user_id)?;
        if contracts.is_empty() {
            return Ok(NO_CONTRACTS.to_string());
        }
        Ok(contracts
            .iter()
            .map(|c| c.describe())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
