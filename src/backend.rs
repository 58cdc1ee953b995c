//! Winit backend: runs the compositor nested inside another session.
//!
//! One calloop event loop drives everything: the wayland socket and
//! client dispatch as fd sources, and a 16 ms timer that pumps winit
//! events, advances animation clocks, renders the frame and sends frame
//! callbacks. Every callback runs to completion on this loop; there are
//! no worker threads.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use calloop::generic::Generic;
use calloop::timer::{TimeoutAction, Timer};
use calloop::{EventLoop, Interest, Mode as FdMode, PostAction};
use log::{info, warn};
use smithay::backend::input::{
    AbsolutePositionEvent, Axis, Event, InputEvent, KeyboardKeyEvent, PointerAxisEvent,
    PointerButtonEvent,
};
use smithay::backend::renderer::gles::GlesRenderer;
use smithay::backend::renderer::{Frame, Renderer};
use smithay::backend::winit::{self, WinitEvent, WinitInput};
use smithay::output::{Mode, Output, PhysicalProperties, Scale, Subpixel};
use smithay::reexports::wayland_server::Display;
use smithay::reexports::winit::dpi::LogicalSize;
use smithay::reexports::winit::platform::pump_events::PumpStatus;
use smithay::reexports::winit::window::WindowAttributes;
use smithay::utils::{Point, Rectangle, Transform};
use smithay::wayland::socket::ListeningSocketSource;

use crate::cli::Cli;
use crate::config::Config;
use crate::layers::OutputEntry;
use crate::render;
use crate::state::{ClientState, Infinidesk};

const REFRESH_MHZ: i32 = 60_000;
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

pub fn run(cli: &Cli, config: Config, stop: Arc<AtomicBool>) -> Result<()> {
    let mut event_loop: EventLoop<Infinidesk> =
        EventLoop::try_new().context("creating the event loop")?;
    let display: Display<Infinidesk> = Display::new().context("creating the wayland display")?;
    let display_handle = display.handle();

    let window_attributes = WindowAttributes::default()
        .with_inner_size(LogicalSize::new(1280.0, 800.0))
        .with_title("infinidesk");
    let (mut backend, mut winit) = winit::init_from_attributes::<GlesRenderer>(window_attributes)
        .map_err(|err| anyhow!("initialising the winit backend: {err}"))?;

    let mut state = Infinidesk::new(display_handle.clone(), event_loop.handle(), config, stop);

    // Advertise the winit window as our single output.
    let mode = Mode {
        size: backend.window_size(),
        refresh: REFRESH_MHZ,
    };
    let output = Output::new(
        "winit".to_string(),
        PhysicalProperties {
            size: (0, 0).into(),
            subpixel: Subpixel::Unknown,
            make: "infinidesk".into(),
            model: "winit".into(),
        },
    );
    let _output_global = output.create_global::<Infinidesk>(&display_handle);
    output.change_current_state(
        Some(mode),
        Some(Transform::Flipped180),
        Some(Scale::Fractional(state.config.scale)),
        Some((0, 0).into()),
    );
    output.set_preferred(mode);

    state.outputs.push(OutputEntry::new(output.clone()));
    state.outputs[0].arrange();
    let logical = state.outputs[0].logical_size();
    state.drawing.panel.reposition(logical.h);

    // Wayland socket for clients.
    let socket = ListeningSocketSource::new_auto().context("binding the wayland socket")?;
    let socket_name = socket.socket_name().to_string_lossy().into_owned();
    event_loop
        .handle()
        .insert_source(socket, |client_stream, _, state| {
            if let Err(err) = state
                .display_handle
                .insert_client(client_stream, Arc::new(ClientState::default()))
            {
                warn!("error adding wayland client: {err}");
            }
        })
        .map_err(|err| anyhow!("registering the socket source: {err}"))?;
    state.socket_name = socket_name.clone();

    // Client request dispatch.
    event_loop
        .handle()
        .insert_source(
            Generic::new(display, Interest::READ, FdMode::Level),
            |_, display, state| {
                // Safety: the display lives as long as this source.
                unsafe {
                    if let Err(err) = display.get_mut().dispatch_clients(state) {
                        warn!("error dispatching clients: {err}");
                    }
                }
                Ok(PostAction::Continue)
            },
        )
        .map_err(|err| anyhow!("registering the display source: {err}"))?;

    // Children inherit the socket.
    unsafe {
        std::env::set_var("WAYLAND_DISPLAY", &socket_name);
    }
    info!("running on WAYLAND_DISPLAY={socket_name}");
    state.run_startup_commands(cli.startup.as_deref());

    // Frame tick: pump winit input, render, send frame callbacks.
    event_loop
        .handle()
        .insert_source(Timer::immediate(), move |_, _, state| {
            let status = winit.dispatch_new_events(|event| match event {
                WinitEvent::Resized { size, .. } => {
                    output.change_current_state(
                        Some(Mode {
                            size,
                            refresh: REFRESH_MHZ,
                        }),
                        None,
                        None,
                        None,
                    );
                    if let Some(entry) = state.outputs.first_mut() {
                        entry.arrange();
                        let logical = entry.logical_size();
                        state.drawing.panel.reposition(logical.h);
                    }
                }
                WinitEvent::Input(event) => handle_input(state, event),
                WinitEvent::CloseRequested => state.running = false,
                _ => {}
            });
            if let PumpStatus::Exit(_) = status {
                state.running = false;
            }

            state.advance_animations();

            let size = backend.window_size();
            let scale = state.config.scale;
            match backend.bind() {
                Ok((renderer, mut framebuffer)) => {
                    let ops = render::assemble_frame(state, renderer, size, scale);
                    match renderer.render(&mut framebuffer, size, Transform::Flipped180) {
                        Ok(mut frame) => {
                            // A failed pass abandons this frame only; the
                            // next tick retries.
                            if let Err(err) = render::execute_frame(&mut frame, size, &ops) {
                                warn!("render pass failed: {err}");
                            }
                            if let Err(err) = frame.finish() {
                                warn!("finishing the frame failed: {err}");
                            }
                        }
                        Err(err) => warn!("failed to begin render pass: {err}"),
                    }
                }
                Err(err) => warn!("failed to bind the backend: {err}"),
            }
            if let Err(err) = backend.submit(Some(&[Rectangle::from_size(size)])) {
                warn!("failed to commit the output: {err}");
            }

            state.send_frame_callbacks();

            TimeoutAction::ToDuration(FRAME_INTERVAL)
        })
        .map_err(|err| anyhow!("registering the frame timer: {err}"))?;

    while !state.should_stop() {
        event_loop
            .dispatch(Some(Duration::from_millis(100)), &mut state)
            .context("dispatching the event loop")?;
        if let Err(err) = state.display_handle.flush_clients() {
            warn!("error flushing clients: {err}");
        }
    }

    info!("shutting down");
    Ok(())
}

fn handle_input(state: &mut Infinidesk, event: InputEvent<WinitInput>) {
    match event {
        InputEvent::Keyboard { event } => {
            state.on_keyboard_key(event.key_code(), event.state(), event.time_msec());
        }
        InputEvent::PointerMotionAbsolute { event } => {
            let Some(size) = state.primary_output().map(|o| o.logical_size()) else {
                return;
            };
            let position = Point::from((
                event.x_transformed(size.w),
                event.y_transformed(size.h),
            ));
            state.on_pointer_motion(position, event.time_msec());
        }
        InputEvent::PointerButton { event } => {
            state.on_pointer_button(event.button_code(), event.state(), event.time_msec());
        }
        InputEvent::PointerAxis { event } => {
            let horizontal = event.amount(Axis::Horizontal).unwrap_or_else(|| {
                event.amount_v120(Axis::Horizontal).unwrap_or(0.0) / 120.0 * 15.0
            });
            let vertical = event.amount(Axis::Vertical).unwrap_or_else(|| {
                event.amount_v120(Axis::Vertical).unwrap_or(0.0) / 120.0 * 15.0
            });
            state.on_pointer_axis(horizontal, vertical, event.source(), event.time_msec());
        }
        _ => {}
    }
}
