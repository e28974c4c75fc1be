//! The Pep/10 instruction table.
//!
//! Every mnemonic has one immutable entry in [`MNEMONICS`], laid out in the same order as the
//! [`Mnemonic`] discriminants so that lookups are a plain index.

#[cfg(test)]
mod test;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddrMode {
    I,
    D,
    N,
    S,
    SF,
    X,
    SX,
    SFX,
}

impl AddrMode {
    pub const ALL: [AddrMode; 8] = {
        use AddrMode::*;
        [I, D, N, S, SF, X, SX, SFX]
    };

    /// Value of the three bit `aaa` field.
    pub fn aaa(self) -> u8 {
        self as u8
    }
    /// Value of the one bit `a` field, only meaningful for `I` and `X`.
    pub fn a(self) -> u8 {
        match self {
            AddrMode::X => 1,
            _ => 0,
        }
    }
    pub fn bit(self) -> u8 {
        1 << self as u8
    }
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(name))
    }
    pub fn name(self) -> &'static str {
        use AddrMode::*;
        match self {
            I => "i",
            D => "d",
            N => "n",
            S => "s",
            SF => "sf",
            X => "x",
            SX => "sx",
            SFX => "sfx",
        }
    }
}

impl std::fmt::Display for AddrMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Mnemonic {
    Ret,
    Sret,
    Movspa,
    Movasp,
    Movflga,
    Movaflg,
    Movta,
    Nop,
    Uscall,
    Nota,
    Notx,
    Nega,
    Negx,
    Asla,
    Aslx,
    Asra,
    Asrx,
    Rola,
    Rolx,
    Rora,
    Rorx,
    Br,
    Brle,
    Brlt,
    Breq,
    Brne,
    Brge,
    Brgt,
    Brv,
    Brc,
    Call,
    Scall,
    Ldwt,
    Ldwa,
    Ldwx,
    Ldba,
    Ldbx,
    Stwa,
    Stwx,
    Stba,
    Stbx,
    Cpwa,
    Cpwx,
    Cpba,
    Cpbx,
    Adda,
    Addx,
    Suba,
    Subx,
    Anda,
    Andx,
    Ora,
    Orx,
    Xora,
    Xorx,
    Addsp,
    Subsp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MnemonicInfo {
    pub mnemonic: Mnemonic,
    pub name: &'static str,
    pub opcode: u8,
    pub unary: bool,
    /// When false the addressing mode may be omitted and defaults to immediate.
    pub mode_required: bool,
    /// Bitmask of legal addressing modes, see [`AddrMode::bit`].
    pub modes: u8,
}

const ALL_MODES: u8 = 0xFF;
const STORE_MODES: u8 = 0xFE;
const BRANCH_MODES: u8 = 0b0010_0001;

const fn unary(mnemonic: Mnemonic, name: &'static str, opcode: u8) -> MnemonicInfo {
    MnemonicInfo {
        mnemonic,
        name,
        opcode,
        unary: true,
        mode_required: false,
        modes: 0,
    }
}
const fn branch(mnemonic: Mnemonic, name: &'static str, opcode: u8) -> MnemonicInfo {
    MnemonicInfo {
        mnemonic,
        name,
        opcode,
        unary: false,
        mode_required: false,
        modes: BRANCH_MODES,
    }
}
const fn general(mnemonic: Mnemonic, name: &'static str, opcode: u8, modes: u8) -> MnemonicInfo {
    MnemonicInfo {
        mnemonic,
        name,
        opcode,
        unary: false,
        mode_required: true,
        modes,
    }
}

pub static MNEMONICS: [MnemonicInfo; 57] = {
    use Mnemonic::*;
    [
        unary(Ret, "RET", 0x00),
        unary(Sret, "SRET", 0x01),
        unary(Movspa, "MOVSPA", 0x02),
        unary(Movasp, "MOVASP", 0x03),
        unary(Movflga, "MOVFLGA", 0x04),
        unary(Movaflg, "MOVAFLG", 0x05),
        unary(Movta, "MOVTA", 0x06),
        unary(Nop, "NOP", 0x07),
        unary(Uscall, "USCALL", 0x08),
        unary(Nota, "NOTA", 0x10),
        unary(Notx, "NOTX", 0x11),
        unary(Nega, "NEGA", 0x12),
        unary(Negx, "NEGX", 0x13),
        unary(Asla, "ASLA", 0x14),
        unary(Aslx, "ASLX", 0x15),
        unary(Asra, "ASRA", 0x16),
        unary(Asrx, "ASRX", 0x17),
        unary(Rola, "ROLA", 0x18),
        unary(Rolx, "ROLX", 0x19),
        unary(Rora, "RORA", 0x1A),
        unary(Rorx, "RORX", 0x1B),
        branch(Br, "BR", 0x1C),
        branch(Brle, "BRLE", 0x1E),
        branch(Brlt, "BRLT", 0x20),
        branch(Breq, "BREQ", 0x22),
        branch(Brne, "BRNE", 0x24),
        branch(Brge, "BRGE", 0x26),
        branch(Brgt, "BRGT", 0x28),
        branch(Brv, "BRV", 0x2A),
        branch(Brc, "BRC", 0x2C),
        branch(Call, "CALL", 0x2E),
        general(Scall, "SCALL", 0x30, ALL_MODES),
        general(Ldwt, "LDWT", 0x38, ALL_MODES),
        general(Ldwa, "LDWA", 0x40, ALL_MODES),
        general(Ldwx, "LDWX", 0x48, ALL_MODES),
        general(Ldba, "LDBA", 0x50, ALL_MODES),
        general(Ldbx, "LDBX", 0x58, ALL_MODES),
        general(Stwa, "STWA", 0x60, STORE_MODES),
        general(Stwx, "STWX", 0x68, STORE_MODES),
        general(Stba, "STBA", 0x70, STORE_MODES),
        general(Stbx, "STBX", 0x78, STORE_MODES),
        general(Cpwa, "CPWA", 0x80, ALL_MODES),
        general(Cpwx, "CPWX", 0x88, ALL_MODES),
        general(Cpba, "CPBA", 0x90, ALL_MODES),
        general(Cpbx, "CPBX", 0x98, ALL_MODES),
        general(Adda, "ADDA", 0xA0, ALL_MODES),
        general(Addx, "ADDX", 0xA8, ALL_MODES),
        general(Suba, "SUBA", 0xB0, ALL_MODES),
        general(Subx, "SUBX", 0xB8, ALL_MODES),
        general(Anda, "ANDA", 0xC0, ALL_MODES),
        general(Andx, "ANDX", 0xC8, ALL_MODES),
        general(Ora, "ORA", 0xD0, ALL_MODES),
        general(Orx, "ORX", 0xD8, ALL_MODES),
        general(Xora, "XORA", 0xE0, ALL_MODES),
        general(Xorx, "XORX", 0xE8, ALL_MODES),
        general(Addsp, "ADDSP", 0xF0, ALL_MODES),
        general(Subsp, "SUBSP", 0xF8, ALL_MODES),
    ]
};

impl Mnemonic {
    pub fn info(self) -> &'static MnemonicInfo {
        &MNEMONICS[self as usize]
    }
    pub fn from_name(name: &str) -> Option<Self> {
        MNEMONICS
            .iter()
            .find(|info| info.name.eq_ignore_ascii_case(name))
            .map(|info| info.mnemonic)
    }
    pub fn name(self) -> &'static str {
        self.info().name
    }
    pub fn is_unary(self) -> bool {
        self.info().unary
    }
    pub fn allows(self, mode: AddrMode) -> bool {
        self.info().modes & mode.bit() != 0
    }
    /// The instruction specifier byte for a nonunary instruction in `mode`.
    pub fn specifier(self, mode: AddrMode) -> u8 {
        let info = self.info();
        if info.mode_required {
            info.opcode + mode.aaa()
        } else {
            info.opcode + mode.a()
        }
    }
}

impl std::fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
