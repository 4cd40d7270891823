use std::cell::{Cell, RefCell};

use integration_tests::{diagnostics_log::DiagRecord, sim_bus::SimBus, TestStatics};
use twincan_common::{
    diagnostics::{Event, Warning},
    traits::TransportError,
    CobKind, Mode, Role,
};
use twincan_node::NodeError;

mod utils;
use utils::builder;

const TPDO1_ID: u16 = 0x181;
const TPDO3_ID: u16 = 0x381;
const RPDO1_ID: u16 = 0x201;
const RPDO2_ID: u16 = 0x301;

#[test]
fn test_tpdo_period() {
    let s = TestStatics::new();
    let bus = SimBus::new();
    let mut transport = bus.transport();
    let count = Cell::new(0u8);
    let mut producer = || {
        count.set(count.get() + 1);
        [count.get(); 8]
    };
    let mut node = builder(&s, Role::Primary, Mode::SingleCore)
        .transport(&mut transport, s.mbox)
        .build()
        .unwrap();
    node.register_tpdo(0, 100, &mut producer).unwrap();
    let mut rx = bus.new_receiver();

    // Not sent before Operational
    s.clock.set(150);
    node.run();
    assert!(rx.drain().is_empty());
    assert_eq!(0, count.get());

    node.enable().unwrap();
    node.run();
    let frames = rx.drain_id(TPDO1_ID);
    assert_eq!(1, frames.len());
    assert_eq!(&[1; 8], frames[0].data());

    s.clock.set(249);
    node.run();
    assert!(rx.drain().is_empty());

    s.clock.set(250);
    node.run();
    let frames = rx.drain_id(TPDO1_ID);
    assert_eq!(1, frames.len());
    assert_eq!(&[2; 8], frames[0].data());
}

#[test]
fn test_tpdos_sent_in_slot_order() {
    let s = TestStatics::new();
    let bus = SimBus::new();
    let mut transport = bus.transport();
    let mut first = || [0x11u8; 8];
    let mut third = || [0x33u8; 8];
    let mut node = builder(&s, Role::Primary, Mode::SingleCore)
        .transport(&mut transport, s.mbox)
        .build()
        .unwrap();
    // Registration order does not matter
    node.register_tpdo(2, 10, &mut third).unwrap();
    node.register_tpdo(0, 10, &mut first).unwrap();
    node.enable().unwrap();
    let mut rx = bus.new_receiver();

    s.clock.set(10);
    node.run();
    let ids: Vec<u32> = rx.drain().iter().map(|msg| msg.id().raw()).collect();
    assert_eq!(vec![TPDO1_ID as u32, TPDO3_ID as u32], ids);
}

#[test]
fn test_rpdo_delivery() {
    const N: u8 = 5;
    let s = TestStatics::new();
    let bus = SimBus::new();
    let mut transport = bus.transport();
    let received = RefCell::new(Vec::new());
    let mut handler = |data: &[u8]| received.borrow_mut().push(data.to_vec());
    let mut node = builder(&s, Role::Primary, Mode::SingleCore)
        .transport(&mut transport, s.mbox)
        .build()
        .unwrap();
    node.register_rpdo(0, 0, &mut handler).unwrap();
    node.enable().unwrap();

    for i in 0..N {
        assert!(bus.deliver(RPDO1_ID, &[i; 8]));
        node.run();
    }

    let expected: Vec<Vec<u8>> = (0..N).map(|i| vec![i; 8]).collect();
    assert_eq!(expected, *received.borrow());
    assert!(s.diag.events().is_empty());
}

#[test]
fn test_rpdo_overrun() {
    let s = TestStatics::new();
    let bus = SimBus::new();
    let mut transport = bus.transport();
    let received = RefCell::new(Vec::new());
    let mut handler = |data: &[u8]| received.borrow_mut().push(data.to_vec());
    let mut node = builder(&s, Role::Primary, Mode::SingleCore)
        .transport(&mut transport, s.mbox)
        .build()
        .unwrap();
    node.register_rpdo(1, 0, &mut handler).unwrap();
    node.enable().unwrap();

    bus.deliver(RPDO2_ID, &[1; 8]);
    bus.deliver(RPDO2_ID, &[2; 8]);
    assert!(s.arena.rpdo_pending(1));
    node.run();
    assert!(!s.arena.rpdo_pending(1));

    assert_eq!(vec![vec![1u8; 8]], *received.borrow());
    assert_eq!(vec![Event::RpdoOverrun(1)], s.diag.events());
}

#[test]
fn test_unhandled_rpdo_is_discarded() {
    let s = TestStatics::new();
    let bus = SimBus::new();
    let mut transport = bus.transport();
    let mut node = builder(&s, Role::Primary, Mode::SingleCore)
        .transport(&mut transport, s.mbox)
        .build()
        .unwrap();
    node.enable().unwrap();

    bus.deliver(RPDO1_ID, &[1; 8]);
    node.run();
    assert!(!s.arena.rpdo_pending(0));
    bus.deliver(RPDO1_ID, &[2; 8]);
    assert!(s.diag.events().is_empty());
}

#[test]
fn test_rpdo_timeout_reporting() {
    let s = TestStatics::new();
    let bus = SimBus::new();
    let mut transport = bus.transport();
    let mut handler = |_: &[u8]| ();
    let mut node = builder(&s, Role::Primary, Mode::SingleCore)
        .transport(&mut transport, s.mbox)
        .build()
        .unwrap();
    node.register_rpdo(0, 50, &mut handler).unwrap();
    node.enable().unwrap();

    s.clock.set(50);
    assert!(!node.rpdo_is_stale(0));
    node.report_rpdo_timeouts();
    assert!(s.diag.records().is_empty());

    s.clock.set(51);
    assert!(node.rpdo_is_stale(0));
    // Slots without a timeout are never stale
    assert!(!node.rpdo_is_stale(1));
    node.report_rpdo_timeouts();
    node.report_rpdo_timeouts();
    assert_eq!(
        vec![DiagRecord::Raised(Warning::RpdoTimeout(0))],
        s.diag.records()
    );

    bus.deliver(RPDO1_ID, &[0; 8]);
    node.run();
    assert!(!node.rpdo_is_stale(0));
    node.report_rpdo_timeouts();
    assert!(!s.diag.is_active(Warning::RpdoTimeout(0)));

    s.clock.set(102);
    assert!(node.rpdo_is_stale(0));
}

#[test]
fn test_pdo_slot_range() {
    let s = TestStatics::new();
    let bus = SimBus::new();
    let mut transport = bus.transport();
    let mut producer = || [0u8; 8];
    let mut handler = |_: &[u8]| ();
    let mut node = builder(&s, Role::Primary, Mode::SingleCore)
        .transport(&mut transport, s.mbox)
        .build()
        .unwrap();

    assert_eq!(
        Err(NodeError::InvalidSlot { slot: 4 }),
        node.register_tpdo(4, 10, &mut producer)
    );
    assert_eq!(
        Err(NodeError::InvalidSlot { slot: 4 }),
        node.register_rpdo(4, 10, &mut handler)
    );
    assert!(!node.rpdo_is_stale(4));
}

#[test]
fn test_transmit_failure_is_reported() {
    let s = TestStatics::new();
    let bus = SimBus::new();
    let mut transport = bus.transport();
    let mut producer = || [0u8; 8];
    let mut node = builder(&s, Role::Primary, Mode::SingleCore)
        .transport(&mut transport, s.mbox)
        .build()
        .unwrap();
    node.register_tpdo(3, 10, &mut producer).unwrap();
    node.enable().unwrap();

    bus.set_send_failure(Some(TransportError::TxBusy));
    s.clock.set(10);
    node.run();
    assert_eq!(vec![Event::TransmitFailed(CobKind::Tpdo4)], s.diag.events());

    // The slot stays on schedule after a failure
    bus.set_send_failure(None);
    let mut rx = bus.new_receiver();
    s.clock.set(19);
    node.run();
    assert!(rx.drain().is_empty());
    s.clock.set(20);
    node.run();
    assert_eq!(1, rx.drain_id(0x481).len());
}
