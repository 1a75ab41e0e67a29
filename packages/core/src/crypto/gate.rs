//! VerificationGate
//!
//! Машина состояний, решающая, можно ли доверять входящему сессионному
//! материалу.
//!
//! ```text
//!             3-of-3 verified (same round)
//! Unverified ─────────────────────────────▶ Verified
//!     ▲                                        │
//!     └────────────────────────────────────────┘
//!        disconnect | room change | new KeyExchange round
//! ```
//!
//! Три результата проверки подписей живут только внутри одного
//! [`RoundVerdict`] и никогда не видны снаружи гейта. Каждый раунд получает
//! [`RoundTicket`]; завершение с устаревшим билетом игнорируется, так что
//! поздний результат старого раунда не может смешаться с новым.
//!
//! Эпоха раунда считается доверенной только после 3/3: до этого она лишь
//! помечает попытку, а защита от повтора смотрит на последнюю проверенную.

use crate::crypto::material::{Epoch, SessionKeyMaterial};
use crate::utils::error::{Result, TandemError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationState {
    Unverified,
    Verified,
}

/// Результаты трёх проверок одного раунда
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundVerdict {
    sym_key_ok: bool,
    iv_ok: bool,
    hash_key_ok: bool,
}

impl RoundVerdict {
    pub fn new(sym_key_ok: bool, iv_ok: bool, hash_key_ok: bool) -> Self {
        Self {
            sym_key_ok,
            iv_ok,
            hash_key_ok,
        }
    }

    pub fn all_ok(&self) -> bool {
        self.sym_key_ok && self.iv_ok && self.hash_key_ok
    }

    /// Сколько из трёх проверок провалилось
    pub fn failures(&self) -> usize {
        [self.sym_key_ok, self.iv_ok, self.hash_key_ok]
            .iter()
            .filter(|ok| !**ok)
            .count()
    }
}

/// Билет раунда, выданный [`VerificationGate::begin_round`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundTicket {
    generation: u64,
    epoch: Epoch,
}

impl RoundTicket {
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }
}

#[derive(Debug, Default)]
pub struct VerificationGate {
    installed: Option<(Epoch, SessionKeyMaterial)>,
    /// Эпоха последнего начатого раунда, даже неудачного
    last_round: Option<Epoch>,
    /// Эпоха последнего раунда, прошедшего 3/3
    last_verified: Option<Epoch>,
    generation: u64,
}

impl VerificationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> VerificationState {
        if self.installed.is_some() {
            VerificationState::Verified
        } else {
            VerificationState::Unverified
        }
    }

    pub fn is_verified(&self) -> bool {
        self.state() == VerificationState::Verified
    }

    /// Эпоха установленного материала (только в Verified)
    pub fn installed_epoch(&self) -> Option<Epoch> {
        self.installed.as_ref().map(|(epoch, _)| *epoch)
    }

    /// Материал доступен только в Verified
    pub fn material(&self) -> Option<&SessionKeyMaterial> {
        self.installed.as_ref().map(|(_, material)| material)
    }

    pub fn last_round_epoch(&self) -> Option<Epoch> {
        self.last_round
    }

    /// Эпоха последнего успешно проверенного раунда
    pub fn last_verified_epoch(&self) -> Option<Epoch> {
        self.last_verified
    }

    /// Начать новый входящий раунд: материал стирается, состояние Unverified.
    ///
    /// Возвращает билет и признак того, что гейт был в Verified.
    pub fn begin_round(&mut self, epoch: Epoch) -> (RoundTicket, bool) {
        let was_verified = self.invalidate();
        self.last_round = Some(epoch);
        let ticket = RoundTicket {
            generation: self.generation,
            epoch,
        };
        (ticket, was_verified)
    }

    /// Завершить раунд. Материал устанавливается атомарно и только при 3/3.
    pub fn complete_round(
        &mut self,
        ticket: RoundTicket,
        verdict: RoundVerdict,
        candidate: SessionKeyMaterial,
    ) -> Result<()> {
        if ticket.generation != self.generation {
            return Err(TandemError::Cancelled);
        }
        if !verdict.all_ok() {
            return Err(TandemError::Verification(format!(
                "{} of 3 key-exchange signatures failed",
                verdict.failures()
            )));
        }
        self.installed = Some((ticket.epoch, candidate));
        self.last_verified = Some(ticket.epoch);
        Ok(())
    }

    /// Сбросить в Unverified и забыть все эпохи (новый собеседник).
    pub fn reset(&mut self) -> bool {
        let was_verified = self.invalidate();
        self.last_round = None;
        self.last_verified = None;
        was_verified
    }

    /// Стереть материал и инвалидировать незавершённые раунды
    fn invalidate(&mut self) -> bool {
        let was_verified = self.installed.take().is_some();
        self.generation = self.generation.wrapping_add(1);
        was_verified
    }
}
