//! Worked distribution examples run end to end through a service instance.

use assert_matches::assert_matches;
use cashback_ledger::{
    config::Settings,
    events::DistributionEvent,
    ledger::{Address, BURN_SINK},
    registry::{PartnerId, PartnerInfo},
    service::CashbackService,
    CashbackError,
};

const OWNER: Address = Address::from_low_u8(1);
const POOL: Address = Address::from_low_u8(2);
const RESERVE: Address = Address::from_low_u8(3);
const BUYER: Address = Address::from_low_u8(10);
const SHOP_WALLET: Address = Address::from_low_u8(20);
const BLOG_WALLET: Address = Address::from_low_u8(21);
const STRANGER: Address = Address::from_low_u8(99);
const RWD: &str = "RWD";

struct Deployment {
    svc: CashbackService,
    shop: PartnerId,
    blog: PartnerId,
}

fn partner(name: &str, wallet: Address) -> PartnerInfo {
    PartnerInfo {
        name: name.into(),
        description: format!("{name} partner"),
        referral_link: format!("https://{name}.example/ref"),
        wallet,
    }
}

fn deploy(pool: u64) -> Deployment {
    let svc = CashbackService::new(&Settings::template(OWNER, POOL, RESERVE)).unwrap();
    let shop = svc.add_partner(&OWNER, partner("shop", SHOP_WALLET)).unwrap();
    let blog = svc.add_partner(&OWNER, partner("blog", BLOG_WALLET)).unwrap();
    if pool > 0 {
        svc.fund(RWD, &POOL, pool).unwrap();
    }
    Deployment { svc, shop, blog }
}

#[test]
fn plain_purchase() {
    let d = deploy(1_000);
    let receipt = d
        .svc
        .issue_cashback_and_distribute(&OWNER, BUYER, 100_000, d.shop)
        .unwrap();
    assert_eq!(receipt.total_cashback, 1_000);
    assert_eq!(receipt.rounding_remainder, 0);
    assert_eq!(d.svc.balance_of(RWD, &BUYER), 700);
    assert_eq!(d.svc.balance_of(RWD, &RESERVE), 200);
    assert_eq!(d.svc.balance_of(RWD, &BURN_SINK), 100);
    assert_eq!(d.svc.pool_balance(), 0);
}

#[test]
fn purchase_with_referral() {
    let d = deploy(1_000);
    d.svc.set_referrer_bonus_percent(&OWNER, 10).unwrap();
    d.svc.register_user(&OWNER, BUYER, d.blog).unwrap();
    let mark = d.svc.event_count();
    d.svc
        .issue_cashback_and_distribute(&OWNER, BUYER, 100_000, d.shop)
        .unwrap();

    assert_eq!(d.svc.balance_of(RWD, &BUYER), 630);
    assert_eq!(d.svc.balance_of(RWD, &BLOG_WALLET), 70);
    assert_eq!(d.svc.balance_of(RWD, &RESERVE), 200);
    assert_eq!(d.svc.balance_of(RWD, &BURN_SINK), 100);
    assert_eq!(
        d.svc.events_since(mark),
        vec![
            DistributionEvent::CashbackIssued {
                user: BUYER,
                amount: 630
            },
            DistributionEvent::ReferrerBonusIssued {
                referrer_id: d.blog,
                wallet: BLOG_WALLET,
                amount: 70
            },
            DistributionEvent::TokensToReserve {
                wallet: RESERVE,
                amount: 200
            },
            DistributionEvent::TokensBurned {
                sink: BURN_SINK,
                amount: 100
            },
        ]
    );
}

#[test]
fn tiny_purchase_is_a_successful_no_op() {
    let d = deploy(0);
    let mark = d.svc.event_count();
    let receipt = d
        .svc
        .issue_cashback_and_distribute(&OWNER, BUYER, 7, d.shop)
        .unwrap();
    assert_eq!(receipt.total_cashback, 0);
    assert!(receipt.transfers.is_empty());
    assert_eq!(d.svc.event_count(), mark);
}

#[test]
fn short_pool_is_all_or_nothing() {
    let d = deploy(999);
    let before = d.svc.snapshot();
    let err = d
        .svc
        .issue_cashback_and_distribute(&OWNER, BUYER, 100_000, d.shop)
        .unwrap_err();
    assert_eq!(
        err,
        CashbackError::InsufficientPoolBalance {
            available: 999,
            required: 1_000
        }
    );
    assert_eq!(d.svc.snapshot(), before);
}

#[test]
fn deactivated_referrer_forfeits_bonus() {
    let d = deploy(1_000);
    d.svc.set_referrer_bonus_percent(&OWNER, 10).unwrap();
    d.svc.register_user(&OWNER, BUYER, d.blog).unwrap();
    d.svc.toggle_partner_status(&OWNER, d.blog, false).unwrap();
    let receipt = d
        .svc
        .issue_cashback_and_distribute(&OWNER, BUYER, 100_000, d.shop)
        .unwrap();
    assert_eq!(receipt.referrer_id, None);
    assert_eq!(d.svc.balance_of(RWD, &BUYER), 700);
    assert_eq!(d.svc.balance_of(RWD, &BLOG_WALLET), 0);
    // The stored link survives deactivation.
    assert_eq!(d.svc.referrer_of(&BUYER), d.blog);
}

#[test]
fn strangers_change_nothing() {
    let d = deploy(1_000);
    let before = d.svc.snapshot();

    let unauthorized = CashbackError::Unauthorized(STRANGER);
    assert_eq!(
        d.svc.add_partner(&STRANGER, partner("x", SHOP_WALLET)),
        Err(unauthorized.clone())
    );
    assert_eq!(
        d.svc.update_partner(&STRANGER, d.shop, partner("x", SHOP_WALLET)),
        Err(unauthorized.clone())
    );
    assert_eq!(
        d.svc.toggle_partner_status(&STRANGER, d.shop, false),
        Err(unauthorized.clone())
    );
    assert_eq!(
        d.svc.register_user(&STRANGER, BUYER, d.blog),
        Err(unauthorized.clone())
    );
    assert_eq!(
        d.svc
            .issue_cashback_and_distribute(&STRANGER, BUYER, 100_000, d.shop),
        Err(unauthorized.clone())
    );
    assert_eq!(
        d.svc.set_cashback_params(&STRANGER, 2, 50, 25, 25),
        Err(unauthorized.clone())
    );
    assert_eq!(
        d.svc.set_referrer_bonus_percent(&STRANGER, 5),
        Err(unauthorized.clone())
    );
    assert_eq!(
        d.svc.set_reserve_wallet(&STRANGER, STRANGER),
        Err(unauthorized.clone())
    );
    assert_eq!(
        d.svc.withdraw_stray_tokens(&STRANGER, "USDC", 1, STRANGER),
        Err(unauthorized.clone())
    );
    assert_eq!(
        d.svc.transfer_ownership(&STRANGER, STRANGER),
        Err(unauthorized)
    );

    assert_eq!(d.svc.snapshot(), before);
}

#[test]
fn partner_lookups() {
    let d = deploy(0);
    let details = d.svc.partner_details(d.shop).unwrap();
    assert!(details.is_active);
    assert_eq!(details.info.name, "shop");
    assert_eq!(d.svc.partner_wallet(d.blog).unwrap(), BLOG_WALLET);
    assert_eq!(d.svc.partner_count(), 2);
    assert_matches!(
        d.svc.partner_details(3),
        Err(CashbackError::InvalidPartnerId(3))
    );
}

#[test]
fn stray_assets_can_be_recovered_but_rewards_cannot() {
    let d = deploy(1_000);
    d.svc.fund("USDC", &POOL, 250).unwrap();
    assert_eq!(
        d.svc.withdraw_stray_tokens(&OWNER, RWD, 10, OWNER),
        Err(CashbackError::ForbiddenAssetWithdrawal(RWD.into()))
    );
    d.svc
        .withdraw_stray_tokens(&OWNER, "USDC", 250, OWNER)
        .unwrap();
    assert_eq!(d.svc.balance_of("USDC", &OWNER), 250);
    assert_eq!(d.svc.pool_balance(), 1_000);
}

#[test]
fn overflowing_recipient_rejects_the_whole_purchase() {
    let d = deploy(1_000);
    d.svc.fund(RWD, &BUYER, u64::MAX - 10).unwrap();
    let before = d.svc.snapshot();
    let supply = |svc: &CashbackService| -> u128 {
        [POOL, BUYER, RESERVE, BURN_SINK]
            .iter()
            .map(|who| u128::from(svc.balance_of(RWD, who)))
            .sum()
    };
    let total = supply(&d.svc);

    assert_matches!(
        d.svc
            .issue_cashback_and_distribute(&OWNER, BUYER, 100_000, d.shop),
        Err(CashbackError::Ledger(_))
    );
    assert_eq!(supply(&d.svc), total);
    assert_eq!(d.svc.snapshot(), before);
}
