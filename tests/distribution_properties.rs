//! Property tests for configuration and split invariants.

use cashback_ledger::{
    config::{DistributionConfig, Settings},
    engine::{percent_of, DistributionPlan, Referrer},
    ledger::Address,
    registry::PartnerInfo,
    service::CashbackService,
};
use proptest::prelude::*;

const OWNER: Address = Address::from_low_u8(1);

fn service() -> CashbackService {
    CashbackService::new(&Settings::template(
        OWNER,
        Address::from_low_u8(2),
        Address::from_low_u8(3),
    ))
    .unwrap()
}

/// Shares that sum to exactly 100.
fn valid_shares() -> impl Strategy<Value = (u8, u8, u8)> {
    (0u8..=100)
        .prop_flat_map(|user| (Just(user), 0u8..=(100 - user)))
        .prop_map(|(user, reserve)| (user, reserve, 100 - user - reserve))
}

fn valid_config() -> impl Strategy<Value = DistributionConfig> {
    (1u8..=100, valid_shares())
        .prop_flat_map(|(base, (user, reserve, burn))| {
            (Just((base, user, reserve, burn)), 0u8..=user)
        })
        .prop_map(|((base, user, reserve, burn), bonus)| DistributionConfig {
            cashback_base_percent: base,
            user_share: user,
            reserve_share: reserve,
            burn_share: burn,
            referrer_bonus_percent: bonus,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn valid_params_are_stored_verbatim(base in 1u8..=100, (user, reserve, burn) in valid_shares()) {
        let svc = service();
        svc.set_cashback_params(&OWNER, base, user, reserve, burn).unwrap();
        let config = svc.config();
        prop_assert_eq!(
            (config.cashback_base_percent, config.user_share, config.reserve_share, config.burn_share),
            (base, user, reserve, burn)
        );
    }

    #[test]
    fn non_summing_params_are_rejected(
        base in 1u8..=100,
        user in 0u8..=255,
        reserve in 0u8..=255,
        burn in 0u8..=255,
    ) {
        prop_assume!(u16::from(user) + u16::from(reserve) + u16::from(burn) != 100);
        let svc = service();
        let before = svc.config();
        prop_assert!(svc.set_cashback_params(&OWNER, base, user, reserve, burn).is_err());
        prop_assert_eq!(svc.config(), before);
    }

    #[test]
    fn bonus_is_accepted_up_to_user_share(percent in 0u8..=255) {
        let svc = service();
        let user_share = svc.config().user_share;
        let result = svc.set_referrer_bonus_percent(&OWNER, percent);
        if percent <= user_share {
            prop_assert!(result.is_ok());
            prop_assert_eq!(svc.config().referrer_bonus_percent, percent);
        } else {
            prop_assert!(result.is_err());
            prop_assert_eq!(svc.config().referrer_bonus_percent, 0);
        }
    }

    #[test]
    fn split_never_exceeds_pool(
        config in valid_config(),
        amount in 0u64..=u64::MAX / 2,
        referred in any::<bool>(),
    ) {
        let referrer = referred.then_some(Referrer { id: 1, wallet: Address::from_low_u8(9) });
        let plan = DistributionPlan::compute(&config, amount, referrer);
        prop_assert!(plan.total_cashback <= amount);
        prop_assert!(plan.distributed() <= plan.total_cashback);
        // Each floor drops less than one unit.
        prop_assert!(plan.rounding_remainder() <= 2);
        // The bonus only redirects part of the user share.
        prop_assert_eq!(
            plan.user_amount + plan.referrer_amount,
            percent_of(plan.total_cashback, config.user_share)
        );
        if !referred || config.referrer_bonus_percent == 0 {
            prop_assert_eq!(plan.referrer_amount, 0);
        }
    }

    #[test]
    fn first_non_zero_referrer_wins(first_is_zero in any::<bool>(), user_tag in 10u8..=250) {
        let svc = service();
        let wallet = Address::from_low_u8(200);
        let info = |name: &str| PartnerInfo {
            name: name.into(),
            description: String::new(),
            referral_link: String::new(),
            wallet,
        };
        let r1 = svc.add_partner(&OWNER, info("r1")).unwrap();
        let r2 = svc.add_partner(&OWNER, info("r2")).unwrap();
        let user = Address::from_low_u8(user_tag);

        let first = if first_is_zero { 0 } else { r1 };
        svc.register_user(&OWNER, user, first).unwrap();
        svc.register_user(&OWNER, user, r2).unwrap();

        let expected = if first_is_zero { r2 } else { r1 };
        prop_assert_eq!(svc.referrer_of(&user), expected);
    }
}
