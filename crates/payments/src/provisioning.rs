use std::collections::HashSet;

use paybook_accounting::{AccountType, NewAccount};

use crate::method::PaymentMethodConfig;

/// Distinct COA codes of enabled methods, in first-seen order.
pub fn enabled_codes(methods: &[PaymentMethodConfig]) -> Vec<String> {
    let mut seen = HashSet::new();
    methods
        .iter()
        .filter(|m| m.enabled)
        .filter(|&m| seen.insert(m.coa_code.as_str()))
        .map(|m| m.coa_code.clone())
        .collect()
}

/// Accounts to insert so that every enabled method's code resolves. One Asset /
/// "Current Asset" account per missing code, named after the first method using it.
pub fn accounts_to_provision(
    methods: &[PaymentMethodConfig],
    existing_codes: &HashSet<String>,
) -> Vec<NewAccount> {
    let mut planned = HashSet::new();
    methods
        .iter()
        .filter(|m| m.enabled && !existing_codes.contains(&m.coa_code))
        .filter(|&m| planned.insert(m.coa_code.as_str()))
        .map(|m| {
            let mut account =
                NewAccount::new(m.coa_code.clone(), m.name.clone(), AccountType::Asset, "Current Asset");
            account.payment_method_id = Some(m.id.to_string());
            account
        })
        .collect()
}
