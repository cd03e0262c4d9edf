//! In-memory doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use airco_bridge_framework::{MessageSink, TopicSet};
use mqtt_bridge_airco::{
    ChangePublisher, CommandTranslator, Controller, DeviceError, Register, RegisterTransport,
    SharedController, StateStore,
};

pub const DEVICE_ID: &str = "lg01";
pub const SETTLE_DELAY: Duration = Duration::from_secs(3);

/// Register contents and fault switches of a [`FakeDevice`].
#[derive(Debug, Default)]
pub struct FakeRegisters {
    pub coils: HashMap<u16, bool>,
    pub inputs: HashMap<u16, u16>,
    pub holding: HashMap<u16, u16>,
    /// Registers that answer with an exception.
    pub rejecting: HashSet<Register>,
    /// Connect attempts fail.
    pub refuse_connect: bool,
    /// Every register call fails at the transport level.
    pub link_down: bool,
    pub connected: bool,
    pub connects: usize,
    pub reads: usize,
    pub writes: Vec<(Register, u16)>,
}

/// A device whose registers live in memory.
#[derive(Debug, Clone, Default)]
pub struct FakeDevice {
    registers: Arc<Mutex<FakeRegisters>>,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registers(&self) -> MutexGuard<'_, FakeRegisters> {
        self.registers.lock().unwrap()
    }

    pub fn set_coil(&self, address: u16, value: bool) {
        self.registers().coils.insert(address, value);
    }

    pub fn set_input(&self, address: u16, value: u16) {
        self.registers().inputs.insert(address, value);
    }

    pub fn set_holding(&self, address: u16, value: u16) {
        self.registers().holding.insert(address, value);
    }

    pub fn reads(&self) -> usize {
        self.registers().reads
    }

    pub fn writes(&self) -> Vec<(Register, u16)> {
        self.registers().writes.clone()
    }

    /// Fill every mapped register with a plausible value.
    pub fn populate(&self) {
        self.set_coil(0, true);
        self.set_input(2, 215);
        self.set_holding(1, 220);
        self.set_holding(0, 0);
        self.set_holding(14, 2);
    }

    fn access(&self, register: Register) -> Result<MutexGuard<'_, FakeRegisters>, DeviceError> {
        let mut regs = self.registers();
        if !regs.connected {
            return Err(DeviceError::Connection("not connected".to_string()));
        }
        if regs.link_down {
            regs.connected = false;
            return Err(DeviceError::Connection(format!("{}: broken pipe", register)));
        }
        Ok(regs)
    }

    fn read(&self, register: Register) -> Result<u16, DeviceError> {
        let mut regs = self.access(register)?;
        regs.reads += 1;

        let value = if regs.rejecting.contains(&register) {
            None
        } else {
            match register {
                Register::Coil(addr) => regs.coils.get(&addr).map(|v| u16::from(*v)),
                Register::Input(addr) => regs.inputs.get(&addr).copied(),
                Register::Holding(addr) => regs.holding.get(&addr).copied(),
            }
        };

        value.ok_or_else(|| DeviceError::Read {
            register,
            message: "Exception: IllegalDataAddress".to_string(),
        })
    }

    fn write(&self, register: Register, value: u16) -> Result<(), DeviceError> {
        let mut regs = self.access(register)?;
        if regs.rejecting.contains(&register) {
            return Err(DeviceError::Write {
                register,
                message: "Exception: ServerDeviceFailure".to_string(),
            });
        }

        regs.writes.push((register, value));
        match register {
            Register::Coil(addr) => {
                regs.coils.insert(addr, value != 0);
            }
            Register::Holding(addr) => {
                regs.holding.insert(addr, value);
            }
            Register::Input(_) => unreachable!("input registers are read-only"),
        }
        Ok(())
    }
}

impl RegisterTransport for FakeDevice {
    async fn ensure_connected(&mut self) -> Result<(), DeviceError> {
        let mut regs = self.registers();
        if regs.connected {
            return Ok(());
        }
        regs.connects += 1;
        if regs.refuse_connect {
            return Err(DeviceError::Connection("Connection refused".to_string()));
        }
        regs.connected = true;
        Ok(())
    }

    async fn read_coil(&mut self, address: u16) -> Result<bool, DeviceError> {
        self.read(Register::Coil(address)).map(|v| v != 0)
    }

    async fn read_input_register(&mut self, address: u16) -> Result<u16, DeviceError> {
        self.read(Register::Input(address))
    }

    async fn read_holding_register(&mut self, address: u16) -> Result<u16, DeviceError> {
        self.read(Register::Holding(address))
    }

    async fn write_coil(&mut self, address: u16, value: bool) -> Result<(), DeviceError> {
        self.write(Register::Coil(address), u16::from(value))
    }

    async fn write_register(&mut self, address: u16, value: u16) -> Result<(), DeviceError> {
        self.write(Register::Holding(address), value)
    }

    async fn disconnect(&mut self) {
        self.registers().connected = false;
    }
}

/// Records every retained publish.
#[derive(Debug, Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }

    /// Return and forget everything recorded so far.
    pub fn take(&self) -> Vec<(String, String)> {
        std::mem::take(&mut *self.messages.lock().unwrap())
    }
}

impl MessageSink for RecordingSink {
    fn publish_retained(&self, topic: &str, payload: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((topic.to_string(), payload.to_string()));
    }
}

pub fn msg(topic: &str, payload: &str) -> (String, String) {
    (format!("{}/{}", DEVICE_ID, topic), payload.to_string())
}

/// The core wired the way the binary wires it, minus the network.
pub struct Bridge {
    pub device: FakeDevice,
    pub sink: Arc<RecordingSink>,
    pub topics: TopicSet,
    pub controller: SharedController<FakeDevice>,
    pub commands: CommandTranslator<FakeDevice>,
}

impl Bridge {
    pub fn new(device: FakeDevice) -> Self {
        let sink = Arc::new(RecordingSink::default());
        let topics = TopicSet::new(DEVICE_ID);

        let mut store = StateStore::new();
        ChangePublisher::new(sink.clone(), topics.clone()).attach(&mut store);
        let controller = Controller::new(device.clone(), store).shared();

        let commands =
            CommandTranslator::new(controller.clone(), sink.clone(), topics.clone(), SETTLE_DELAY);

        Self {
            device,
            sink,
            topics,
            controller,
            commands,
        }
    }

    /// A bridge whose device connection is already open.
    pub async fn connected(device: FakeDevice) -> Self {
        let bridge = Self::new(device);
        bridge
            .controller
            .lock()
            .await
            .connect()
            .await
            .expect("fake device connects");
        bridge
    }

    pub async fn skip_polls(&self) -> u8 {
        self.controller.lock().await.skip_polls()
    }
}
