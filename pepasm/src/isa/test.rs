use expect_test::{expect, Expect};

use super::{AddrMode, Mnemonic, MNEMONICS};

fn check(names: &[&str], expect: Expect) {
    let output = names
        .iter()
        .map(|name| match Mnemonic::from_name(name) {
            Some(m) => {
                let info = m.info();
                let modes = AddrMode::ALL
                    .into_iter()
                    .filter(|mode| m.allows(*mode))
                    .map(AddrMode::name)
                    .collect::<Vec<_>>()
                    .join(",");
                format!(
                    "{name}: {m:?} {:02X} unary={} required={} [{modes}]\n",
                    info.opcode, info.unary, info.mode_required
                )
            }
            None => format!("{name}: none\n"),
        })
        .collect::<String>();
    expect.assert_eq(&output);
}

#[test]
fn table_is_indexed_by_discriminant() {
    for (i, info) in MNEMONICS.iter().enumerate() {
        assert_eq!(info.mnemonic as usize, i, "{}", info.name);
    }
}

#[test]
fn lookup() {
    check(
        &["ret", "Br", "LDWA", "stba", "subsp", "movta", "lodwa", ""],
        expect![[r#"
            ret: Ret 00 unary=true required=false []
            Br: Br 1C unary=false required=false [i,x]
            LDWA: Ldwa 40 unary=false required=true [i,d,n,s,sf,x,sx,sfx]
            stba: Stba 70 unary=false required=true [d,n,s,sf,x,sx,sfx]
            subsp: Subsp F8 unary=false required=true [i,d,n,s,sf,x,sx,sfx]
            movta: Movta 06 unary=true required=false []
            lodwa: none
            : none
        "#]],
    );
}

#[test]
fn specifiers() {
    assert_eq!(Mnemonic::Ldwa.specifier(AddrMode::I), 0x40);
    assert_eq!(Mnemonic::Ldwa.specifier(AddrMode::SFX), 0x47);
    assert_eq!(Mnemonic::Br.specifier(AddrMode::I), 0x1C);
    assert_eq!(Mnemonic::Br.specifier(AddrMode::X), 0x1D);
    assert_eq!(Mnemonic::Call.specifier(AddrMode::X), 0x2F);
}

#[test]
fn addressing_modes() {
    assert_eq!(AddrMode::from_name("SFX"), Some(AddrMode::SFX));
    assert_eq!(AddrMode::from_name("sf"), Some(AddrMode::SF));
    assert_eq!(AddrMode::from_name("q"), None);
    assert_eq!(AddrMode::X.bit(), 32);
}
