//! Scripted stand-ins for the device, shared by the flow tests.
//!
//! A [`FakeWorld`] holds named screens and the transitions between them. The driver and shell
//! handed out by a world share its state, so a store launch through the shell changes what the
//! next snapshot shows.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::Duration;

use crate::app::adb::shell::ShellExecutor;
use crate::app::config::FlowTimings;
use crate::app::device::Device;
use crate::app::error::AppError;
use crate::app::ui::driver::{DeviceKey, UiDriver};
use crate::app::ui::hierarchy::{Bounds, Screen, UiNode};
use crate::app::ui::selector::Selector;

pub const TRACE_ID: &str = "trace-test";
const LAUNCHER: &str = "com.android.launcher";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A click on a node whose text or description equals the label.
    Tap(String),
    Key(DeviceKey),
    Launch(String),
    Action(String),
    /// A fling or scroll of a container.
    Scroll,
    /// Any wait call; models a screen that changes while the flow waits.
    Wait,
    /// Anything but a wait.
    Any,
}

impl Event {
    pub fn tap(label: &str) -> Self {
        Event::Tap(label.to_string())
    }

    pub fn launch(component: &str) -> Self {
        Event::Launch(component.to_string())
    }

    pub fn action(action: &str) -> Self {
        Event::Action(action.to_string())
    }
}

#[derive(Debug, Clone)]
struct Transition {
    from: Option<String>,
    event: Event,
    requires_text: Option<String>,
    to: String,
}

#[derive(Debug, Default)]
struct World {
    screens: HashMap<String, Vec<UiNode>>,
    current: String,
    /// Text typed into the current screen; dropped when the screen changes.
    edited: Option<Vec<UiNode>>,
    transitions: Vec<Transition>,
    actions: Vec<String>,
    taps: Vec<(String, UiNode)>,
    shell_log: Vec<String>,
    snapshots: usize,
    hang_on: HashSet<String>,
    broken: bool,
    orientation_failures: usize,
    fail_uninstall: bool,
}

impl World {
    fn nodes(&self) -> Vec<UiNode> {
        match &self.edited {
            Some(nodes) => nodes.clone(),
            None => self.screens.get(&self.current).cloned().unwrap_or_default(),
        }
    }

    fn fire(&mut self, event: &Event, tapped: Option<&UiNode>) {
        let current_nodes = self.nodes();
        let next = self.transitions.iter().find(|transition| {
            let from_ok = transition
                .from
                .as_ref()
                .map_or(true, |from| *from == self.current);
            let event_ok = match (&transition.event, event) {
                (Event::Any, Event::Wait) => false,
                (Event::Any, _) => true,
                (Event::Tap(label), Event::Tap(_)) => tapped.is_some_and(|node| {
                    node.text == *label || node.content_desc == *label
                }),
                (expected, actual) => expected == actual,
            };
            let requires_ok = transition.requires_text.as_ref().map_or(true, |text| {
                current_nodes.iter().any(|node| node.text == *text)
            });
            from_ok && event_ok && requires_ok
        });
        if let Some(transition) = next {
            self.current = transition.to.clone();
            self.edited = None;
        }
    }

    fn channel(&self) -> Result<(), AppError> {
        if self.broken {
            return Err(AppError::driver("automation channel unreachable", TRACE_ID));
        }
        Ok(())
    }

    fn locate(&self, selector: &Selector) -> Result<(usize, UiNode), AppError> {
        let screen = Screen::new(self.nodes());
        let found = screen.find(selector).ok_or_else(|| {
            AppError::element_not_found(format!("no element matches {selector}"), TRACE_ID)
        })?;
        let index = screen
            .nodes()
            .iter()
            .position(|node| std::ptr::eq(node, found))
            .unwrap_or_default();
        Ok((index, found.clone()))
    }
}

fn describe(node: &UiNode) -> &str {
    if !node.text.is_empty() {
        &node.text
    } else if !node.content_desc.is_empty() {
        &node.content_desc
    } else {
        &node.class_name
    }
}

#[derive(Clone, Default)]
pub struct FakeWorld {
    inner: Rc<RefCell<World>>,
}

impl FakeWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first screen added is the one the device starts on.
    pub fn add_screen(&self, name: &str, nodes: Vec<UiNode>) {
        let mut world = self.inner.borrow_mut();
        if world.screens.is_empty() {
            world.current = name.to_string();
        }
        world.screens.insert(name.to_string(), nodes);
    }

    pub fn on(&self, from: &str, event: Event, to: &str) {
        self.push(Some(from), event, None, to);
    }

    pub fn on_any_screen(&self, event: Event, to: &str) {
        self.push(None, event, None, to);
    }

    /// Like [`FakeWorld::on`], but only while a node with `text` is on screen.
    pub fn on_when(&self, from: &str, event: Event, text: &str, to: &str) {
        self.push(Some(from), event, Some(text), to);
    }

    /// Like [`FakeWorld::on`], but checked before every transition added so far.
    pub fn on_first(&self, from: &str, event: Event, to: &str) {
        self.inner.borrow_mut().transitions.insert(
            0,
            Transition {
                from: Some(from.to_string()),
                event,
                requires_text: None,
                to: to.to_string(),
            },
        );
    }

    fn push(&self, from: Option<&str>, event: Event, text: Option<&str>, to: &str) {
        self.inner.borrow_mut().transitions.push(Transition {
            from: from.map(str::to_string),
            event,
            requires_text: text.map(str::to_string),
            to: to.to_string(),
        });
    }

    /// Screens shown one after another, advancing on every action.
    pub fn sequence(&self, screens: Vec<Vec<UiNode>>) {
        let count = screens.len();
        for (index, nodes) in screens.into_iter().enumerate() {
            let name = format!("s{index}");
            self.add_screen(&name, nodes);
            if index + 1 < count {
                self.on(&name, Event::Any, &format!("s{}", index + 1));
            }
        }
    }

    /// Waits on `screen` block for their whole timeout.
    pub fn hang_waits_on(&self, screen: &str) {
        self.inner.borrow_mut().hang_on.insert(screen.to_string());
    }

    pub fn break_channel(&self) {
        self.inner.borrow_mut().broken = true;
    }

    pub fn fail_orientation(&self, times: usize) {
        self.inner.borrow_mut().orientation_failures = times;
    }

    pub fn fail_uninstall(&self) {
        self.inner.borrow_mut().fail_uninstall = true;
    }

    pub fn current(&self) -> String {
        self.inner.borrow().current.clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.inner.borrow().actions.clone()
    }

    /// Every clicked node with the screen it was clicked on.
    pub fn taps(&self) -> Vec<(String, UiNode)> {
        self.inner.borrow().taps.clone()
    }

    pub fn screen(&self, name: &str) -> Screen {
        Screen::new(
            self.inner
                .borrow()
                .screens
                .get(name)
                .cloned()
                .unwrap_or_default(),
        )
    }

    pub fn shell_log(&self) -> Vec<String> {
        self.inner.borrow().shell_log.clone()
    }

    pub fn snapshot_count(&self) -> usize {
        self.inner.borrow().snapshots
    }

    pub fn driver(&self) -> ScriptedDriver {
        ScriptedDriver {
            world: Rc::clone(&self.inner),
        }
    }

    pub fn shell(&self) -> FakeShell {
        FakeShell {
            world: Rc::clone(&self.inner),
        }
    }

    pub fn device(&self) -> Device {
        Device::new(
            Box::new(self.driver()),
            Box::new(self.shell()),
            FlowTimings::without_pauses(),
            TRACE_ID,
        )
    }
}

pub struct ScriptedDriver {
    world: Rc<RefCell<World>>,
}

impl ScriptedDriver {
    fn wait_for(&mut self, timeout: Duration, done: impl Fn(&Screen) -> bool) -> Result<bool, AppError> {
        let hang = {
            let mut world = self.world.borrow_mut();
            world.channel()?;
            world.fire(&Event::Wait, None);
            if done(&Screen::new(world.nodes())) {
                return Ok(true);
            }
            world.hang_on.contains(&world.current)
        };
        if hang {
            std::thread::sleep(timeout);
        }
        Ok(false)
    }
}

impl UiDriver for ScriptedDriver {
    fn snapshot(&mut self) -> Result<Screen, AppError> {
        let mut world = self.world.borrow_mut();
        world.channel()?;
        world.snapshots += 1;
        Ok(Screen::new(world.nodes()))
    }

    fn wait_exists(&mut self, selector: &Selector, timeout: Duration) -> Result<bool, AppError> {
        self.wait_for(timeout, |screen| screen.exists(selector))
    }

    fn wait_gone(&mut self, selector: &Selector, timeout: Duration) -> Result<bool, AppError> {
        self.wait_for(timeout, |screen| !screen.exists(selector))
    }

    fn click(&mut self, selector: &Selector) -> Result<(), AppError> {
        let mut world = self.world.borrow_mut();
        world.channel()?;
        let (_, node) = world.locate(selector)?;
        let entry = format!("click {}", describe(&node));
        world.actions.push(entry);
        let screen = world.current.clone();
        world.taps.push((screen, node.clone()));
        world.fire(&Event::Tap(describe(&node).to_string()), Some(&node));
        Ok(())
    }

    fn set_text(&mut self, selector: &Selector, text: &str) -> Result<(), AppError> {
        let mut world = self.world.borrow_mut();
        world.channel()?;
        let (index, node) = world.locate(selector)?;
        let entry = format!("set_text {}={text}", describe(&node));
        world.actions.push(entry);
        let mut nodes = world.nodes();
        if let Some(target) = nodes.get_mut(index) {
            target.text = text.to_string();
        }
        world.edited = Some(nodes);
        Ok(())
    }

    fn fling_to_end(&mut self, container: &Selector) -> Result<(), AppError> {
        let mut world = self.world.borrow_mut();
        world.channel()?;
        let (_, node) = world.locate(container)?;
        let entry = format!("fling {}", describe(&node));
        world.actions.push(entry);
        world.fire(&Event::Scroll, None);
        Ok(())
    }

    fn scroll_to(&mut self, container: &Selector, target: &Selector) -> Result<bool, AppError> {
        let mut world = self.world.borrow_mut();
        world.channel()?;
        let (_, node) = world.locate(container)?;
        let entry = format!("scroll {}", describe(&node));
        world.actions.push(entry);
        world.fire(&Event::Scroll, None);
        Ok(Screen::new(world.nodes()).exists(target))
    }

    fn press(&mut self, key: DeviceKey) -> Result<(), AppError> {
        let mut world = self.world.borrow_mut();
        world.channel()?;
        world.actions.push(format!("press {}", key.keycode()));
        world.fire(&Event::Key(key), None);
        Ok(())
    }

    fn foreground_app(&mut self) -> Result<String, AppError> {
        let world = self.world.borrow();
        world.channel()?;
        Ok(world
            .nodes()
            .iter()
            .find(|node| !node.package.is_empty())
            .map(|node| node.package.clone())
            .unwrap_or_else(|| LAUNCHER.to_string()))
    }

    fn dump_screen(&mut self) -> Result<String, AppError> {
        let world = self.world.borrow();
        world.channel()?;
        Ok(format!("<hierarchy screen=\"{}\"/>", world.current))
    }

    fn set_natural_orientation(&mut self) -> Result<(), AppError> {
        let mut world = self.world.borrow_mut();
        world.channel()?;
        if world.orientation_failures > 0 {
            world.orientation_failures -= 1;
            return Err(AppError::driver("rpc server not responding", TRACE_ID));
        }
        world.actions.push("orientation natural".to_string());
        Ok(())
    }
}

pub struct FakeShell {
    world: Rc<RefCell<World>>,
}

impl ShellExecutor for FakeShell {
    fn clear_app_data(&mut self, package: &str) -> Result<(), AppError> {
        self.world
            .borrow_mut()
            .shell_log
            .push(format!("clear {package}"));
        Ok(())
    }

    fn uninstall(&mut self, package: &str) -> Result<(), AppError> {
        let mut world = self.world.borrow_mut();
        world.shell_log.push(format!("uninstall {package}"));
        if world.fail_uninstall {
            return Err(AppError::system("Failure [not installed]", TRACE_ID));
        }
        Ok(())
    }

    fn start_component(&mut self, component: &str) -> Result<(), AppError> {
        let mut world = self.world.borrow_mut();
        world.shell_log.push(format!("start {component}"));
        world.fire(&Event::launch(component), None);
        Ok(())
    }

    fn start_action(&mut self, action: &str) -> Result<(), AppError> {
        let mut world = self.world.borrow_mut();
        world.shell_log.push(format!("action {action}"));
        world.fire(&Event::action(action), None);
        Ok(())
    }

    fn go_home(&mut self) -> Result<(), AppError> {
        self.world.borrow_mut().shell_log.push("home".to_string());
        Ok(())
    }
}

pub fn label(text: &str) -> UiNode {
    UiNode {
        text: text.to_string(),
        class_name: "android.widget.TextView".to_string(),
        ..UiNode::default()
    }
}

pub fn button(text: &str) -> UiNode {
    UiNode {
        text: text.to_string(),
        class_name: "android.widget.Button".to_string(),
        clickable: true,
        ..UiNode::default()
    }
}

pub fn icon(description: &str) -> UiNode {
    UiNode {
        content_desc: description.to_string(),
        class_name: "android.widget.ImageView".to_string(),
        clickable: true,
        ..UiNode::default()
    }
}

pub fn edit_text(text: &str) -> UiNode {
    UiNode {
        text: text.to_string(),
        class_name: "android.widget.EditText".to_string(),
        clickable: true,
        focused: true,
        ..UiNode::default()
    }
}

pub fn checkbox(text: &str, checked: bool) -> UiNode {
    UiNode {
        text: text.to_string(),
        class_name: "android.widget.CheckBox".to_string(),
        clickable: true,
        checkable: true,
        checked,
        ..UiNode::default()
    }
}

pub fn at(mut node: UiNode, left: i32, top: i32, right: i32, bottom: i32) -> UiNode {
    node.bounds = Bounds::new(left, top, right, bottom);
    node
}

pub fn in_package(mut node: UiNode, package: &str) -> UiNode {
    node.package = package.to_string();
    node
}
