use cardwise_core::domain::card::{
    CapPeriod, CardNetwork, CardProduct, EarningRule, RewardProgram, RewardUnit, SpendCap,
};
use cardwise_core::domain::catalog::{Catalog, CatalogDraft};

pub const SEED_SOURCE: &str = "builtin_seed";

/// Built-in default catalog, used when no external feed is configured or as
/// a first snapshot on a fresh deployment. Hand-maintained from issuer
/// terms; rates and caps drift, so prefer the feed once one exists.
pub fn build_seed_catalog() -> anyhow::Result<(Catalog, serde_json::Value)> {
    let draft = seed_draft();
    let raw = serde_json::to_value(&draft)?;
    let catalog = draft.validate_and_into_catalog()?;
    Ok((catalog, raw))
}

fn seed_draft() -> CatalogDraft {
    let programs = vec![
        program("chase_ur", "Chase Ultimate Rewards", RewardUnit::Points, 1.7),
        program(
            "amex_mr",
            "American Express Membership Rewards",
            RewardUnit::Points,
            1.7,
        ),
        program("citi_ty", "Citi ThankYou Points", RewardUnit::Points, 1.5),
        program(
            "capital_one_miles",
            "Capital One Miles",
            RewardUnit::Miles,
            1.6,
        ),
        program(
            "aa_miles",
            "American Airlines AAdvantage",
            RewardUnit::Miles,
            1.4,
        ),
        program("cashback", "Direct Cashback", RewardUnit::Cashback, 1.0),
    ];

    let cards = vec![
        card(
            "chase_sapphire_preferred",
            "Chase Sapphire Preferred",
            "Chase",
            CardNetwork::Visa,
            95.0,
            "chase_ur",
            1.0,
        ),
        card(
            "chase_freedom_unlimited",
            "Chase Freedom Unlimited",
            "Chase",
            CardNetwork::Visa,
            0.0,
            "chase_ur",
            1.5,
        ),
        card(
            "chase_freedom_flex",
            "Chase Freedom Flex",
            "Chase",
            CardNetwork::Visa,
            0.0,
            "chase_ur",
            1.0,
        ),
        card(
            "amex_blue_cash_preferred",
            "Blue Cash Preferred",
            "American Express",
            CardNetwork::Amex,
            95.0,
            "cashback",
            1.0,
        ),
        card(
            "amex_blue_cash_everyday",
            "Blue Cash Everyday",
            "American Express",
            CardNetwork::Amex,
            0.0,
            "cashback",
            1.0,
        ),
        card(
            "amex_gold",
            "American Express Gold",
            "American Express",
            CardNetwork::Amex,
            250.0,
            "amex_mr",
            1.0,
        ),
        card(
            "citi_double_cash",
            "Citi Double Cash",
            "Citi",
            CardNetwork::Mastercard,
            0.0,
            "cashback",
            2.0,
        ),
        card(
            "citi_custom_cash",
            "Citi Custom Cash",
            "Citi",
            CardNetwork::Mastercard,
            0.0,
            "citi_ty",
            1.0,
        ),
        card(
            "citi_aadvantage_platinum",
            "Citi AAdvantage Platinum Select",
            "Citi",
            CardNetwork::Mastercard,
            99.0,
            "aa_miles",
            1.0,
        ),
        card(
            "capital_one_venture",
            "Capital One Venture",
            "Capital One",
            CardNetwork::Visa,
            95.0,
            "capital_one_miles",
            2.0,
        ),
        card(
            "discover_it_cash_back",
            "Discover it Cash Back",
            "Discover",
            CardNetwork::Discover,
            0.0,
            "cashback",
            1.0,
        ),
        card(
            "wells_fargo_active_cash",
            "Wells Fargo Active Cash",
            "Wells Fargo",
            CardNetwork::Visa,
            0.0,
            "cashback",
            2.0,
        ),
    ];

    let rules = vec![
        // Chase Sapphire Preferred
        rule("chase_sapphire_preferred", Some("restaurants"), 3.0),
        rule("chase_sapphire_preferred", Some("travel"), 2.0),
        rule("chase_sapphire_preferred", Some("streaming"), 3.0),
        rule("chase_sapphire_preferred", None, 1.0),
        // Chase Freedom Unlimited
        rule("chase_freedom_unlimited", Some("restaurants"), 3.0),
        rule("chase_freedom_unlimited", Some("pharmacy"), 3.0),
        rule("chase_freedom_unlimited", None, 1.5),
        // Chase Freedom Flex: rotating 5x quarterly categories.
        rotating_rule(
            "chase_freedom_flex",
            Some("groceries"),
            5.0,
            cap(1_500.0, CapPeriod::Quarter),
        ),
        rule("chase_freedom_flex", Some("restaurants"), 3.0),
        rule("chase_freedom_flex", Some("pharmacy"), 3.0),
        rule("chase_freedom_flex", None, 1.0),
        // Blue Cash Preferred
        capped_rule(
            "amex_blue_cash_preferred",
            Some("groceries"),
            6.0,
            cap(6_000.0, CapPeriod::Year),
        ),
        rule("amex_blue_cash_preferred", Some("streaming"), 6.0),
        rule("amex_blue_cash_preferred", Some("gas"), 3.0),
        rule("amex_blue_cash_preferred", Some("transit"), 3.0),
        rule("amex_blue_cash_preferred", None, 1.0),
        // Blue Cash Everyday
        capped_rule(
            "amex_blue_cash_everyday",
            Some("groceries"),
            3.0,
            cap(6_000.0, CapPeriod::Year),
        ),
        capped_rule(
            "amex_blue_cash_everyday",
            Some("online_shopping"),
            3.0,
            cap(6_000.0, CapPeriod::Year),
        ),
        capped_rule(
            "amex_blue_cash_everyday",
            Some("gas"),
            3.0,
            cap(6_000.0, CapPeriod::Year),
        ),
        rule("amex_blue_cash_everyday", None, 1.0),
        // American Express Gold
        rule("amex_gold", Some("restaurants"), 4.0),
        capped_rule(
            "amex_gold",
            Some("groceries"),
            4.0,
            cap(25_000.0, CapPeriod::Year),
        ),
        rule("amex_gold", None, 1.0),
        // Citi Double Cash
        rule("citi_double_cash", None, 2.0),
        // Citi Custom Cash: 5x on the top eligible category, groceries here.
        capped_rule(
            "citi_custom_cash",
            Some("groceries"),
            5.0,
            cap(500.0, CapPeriod::Month),
        ),
        rule("citi_custom_cash", None, 1.0),
        // Citi AAdvantage Platinum Select
        rule("citi_aadvantage_platinum", Some("travel"), 2.0),
        rule("citi_aadvantage_platinum", Some("gas"), 2.0),
        rule("citi_aadvantage_platinum", Some("restaurants"), 2.0),
        rule("citi_aadvantage_platinum", None, 1.0),
        // Capital One Venture
        rule("capital_one_venture", None, 2.0),
        // Discover it: rotating 5% quarterly categories.
        rotating_rule(
            "discover_it_cash_back",
            Some("groceries"),
            5.0,
            cap(1_500.0, CapPeriod::Quarter),
        ),
        rotating_rule(
            "discover_it_cash_back",
            Some("gas"),
            5.0,
            cap(1_500.0, CapPeriod::Quarter),
        ),
        rule("discover_it_cash_back", None, 1.0),
        // Wells Fargo Active Cash
        rule("wells_fargo_active_cash", None, 2.0),
    ];

    CatalogDraft {
        programs,
        cards,
        rules,
    }
}

fn program(id: &str, name: &str, unit: RewardUnit, cents_per_unit: f64) -> RewardProgram {
    RewardProgram {
        id: id.to_string(),
        name: name.to_string(),
        unit,
        cents_per_unit,
    }
}

fn card(
    id: &str,
    name: &str,
    issuer: &str,
    network: CardNetwork,
    annual_fee: f64,
    program_id: &str,
    base_multiplier: f64,
) -> CardProduct {
    CardProduct {
        id: id.to_string(),
        name: name.to_string(),
        issuer: issuer.to_string(),
        network,
        annual_fee,
        program_id: program_id.to_string(),
        base_multiplier,
    }
}

fn rule(card_id: &str, category: Option<&str>, multiplier: f64) -> EarningRule {
    EarningRule {
        card_id: card_id.to_string(),
        category: category.map(str::to_string),
        multiplier,
        cap: None,
        rotating: false,
    }
}

fn capped_rule(
    card_id: &str,
    category: Option<&str>,
    multiplier: f64,
    cap: SpendCap,
) -> EarningRule {
    EarningRule {
        cap: Some(cap),
        ..rule(card_id, category, multiplier)
    }
}

fn rotating_rule(
    card_id: &str,
    category: Option<&str>,
    multiplier: f64,
    cap: SpendCap,
) -> EarningRule {
    EarningRule {
        rotating: true,
        ..capped_rule(card_id, category, multiplier, cap)
    }
}

fn cap(amount: f64, period: CapPeriod) -> SpendCap {
    SpendCap { amount, period }
}
