//! CPU-visible GS interrupt registers
//!
//! These live on the producer side: the SIGNAL/FINISH/LABEL writes parsed
//! out of the GIF stream land here synchronously, before the data packet is
//! queued, which is what keeps interrupt timing on the CPU clock.

use bitflags::bitflags;
use eb_gif::AdRegSink;

bitflags! {
    /// Interrupt status flags in the control register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CsrFlags: u32 {
        const SIGNAL = 1 << 0;
        const FINISH = 1 << 1;
        const HSINT  = 1 << 2;
        const VSINT  = 1 << 3;
        const EDWINT = 1 << 4;
    }
}

bitflags! {
    /// Interrupt mask register; a set bit suppresses the matching IRQ.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ImrFlags: u32 {
        const SIGMSK    = 1 << 8;
        const FINISHMSK = 1 << 9;
        const HSMSK     = 1 << 10;
        const VSMSK     = 1 << 11;
        const EDWMSK    = 1 << 12;
    }
}

/// Hook the embedding CPU loop supplies at `open`. Invoked synchronously
/// from the producer's parse call; by contract it only flags the interrupt
/// for the CPU loop's next timing tick.
pub type IrqCallback = Box<dyn FnMut() + Send>;

/// Register file mutated by the A+D handlers.
pub struct GsRegisters {
    csr: CsrFlags,
    imr: ImrFlags,
    sigid: u32,
    lblid: u32,
    irq: IrqCallback,
}

impl GsRegisters {
    /// All interrupts masked at reset.
    pub fn new(irq: IrqCallback) -> Self {
        Self {
            csr: CsrFlags::empty(),
            imr: ImrFlags::all(),
            sigid: 0,
            lblid: 0,
            irq,
        }
    }

    pub fn csr(&self) -> CsrFlags {
        self.csr
    }

    pub fn imr(&self) -> ImrFlags {
        self.imr
    }

    pub fn set_imr(&mut self, imr: ImrFlags) {
        self.imr = imr;
    }

    /// SIGID in the low word, LBLID in the high word.
    pub fn siglblid(&self) -> u64 {
        self.sigid as u64 | ((self.lblid as u64) << 32)
    }

    /// Control-register write: flag bits are write-1-to-clear.
    pub fn write_csr(&mut self, value: u32) {
        self.csr.remove(CsrFlags::from_bits_truncate(value));
    }

    fn raise(&mut self, flag: CsrFlags, mask: ImrFlags) {
        self.csr.insert(flag);
        if !self.imr.contains(mask) {
            (self.irq)();
        }
    }
}

impl AdRegSink for GsRegisters {
    fn signal(&mut self, payload: [u32; 2]) {
        let [id, idmsk] = payload;
        self.sigid = (self.sigid & !idmsk) | (id & idmsk);
        self.raise(CsrFlags::SIGNAL, ImrFlags::SIGMSK);
    }

    fn finish(&mut self, _payload: [u32; 2]) {
        self.raise(CsrFlags::FINISH, ImrFlags::FINISHMSK);
    }

    fn label(&mut self, payload: [u32; 2]) {
        let [id, idmsk] = payload;
        self.lblid = (self.lblid & !idmsk) | (id & idmsk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn counting_regs() -> (GsRegisters, Arc<AtomicU32>) {
        let count = Arc::new(AtomicU32::new(0));
        let hook = Arc::clone(&count);
        let regs = GsRegisters::new(Box::new(move || {
            hook.fetch_add(1, Ordering::Relaxed);
        }));
        (regs, count)
    }

    #[test]
    fn test_signal_merges_id_under_mask() {
        let (mut regs, _irqs) = counting_regs();

        regs.signal([0xaaaa_aaaa, 0x0000_ffff]);
        assert_eq!(regs.siglblid() as u32, 0x0000_aaaa);
        assert!(regs.csr().contains(CsrFlags::SIGNAL));
    }

    #[test]
    fn test_irq_gated_by_imr() {
        let (mut regs, irqs) = counting_regs();

        regs.finish([0, 0]);
        assert_eq!(irqs.load(Ordering::Relaxed), 0);

        regs.set_imr(ImrFlags::all() - ImrFlags::FINISHMSK);
        regs.finish([0, 0]);
        assert_eq!(irqs.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_label_never_interrupts() {
        let (mut regs, irqs) = counting_regs();

        regs.set_imr(ImrFlags::empty());
        regs.label([0x1234, 0xffff_ffff]);
        assert_eq!(regs.siglblid() >> 32, 0x1234);
        assert_eq!(irqs.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_csr_write_one_to_clear() {
        let (mut regs, _irqs) = counting_regs();

        regs.signal([1, 1]);
        regs.finish([0, 0]);
        assert!(regs.csr().contains(CsrFlags::SIGNAL | CsrFlags::FINISH));

        regs.write_csr(CsrFlags::SIGNAL.bits());
        assert!(!regs.csr().contains(CsrFlags::SIGNAL));
        assert!(regs.csr().contains(CsrFlags::FINISH));
    }
}
