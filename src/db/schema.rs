//! Reference DDL for a Timecapsule project on the hosted Postgres.
//! The service never applies it; `timecapsule schema` prints it for the SQL editor.

/// Tables, constraints and row-level-security policies:
/// - `public.users` is filled by a trigger on `auth.users` (sign-up metadata included)
/// - `tags.name` is UNIQUE; tag upserts conflict on it
/// - capsules are readable by their owner and members; items become publicly
///   readable only once their capsule is released and public
pub const SUPABASE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS public.users (
    id UUID PRIMARY KEY REFERENCES auth.users(id) ON DELETE CASCADE,
    email TEXT,
    username TEXT,
    notify_on_release BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS public.capsules (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    owner_id UUID NOT NULL REFERENCES public.users(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    unlock_at TIMESTAMPTZ NOT NULL,
    is_released BOOLEAN NOT NULL DEFAULT FALSE,
    is_public_on_release BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS public.capsule_items (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    capsule_id UUID NOT NULL REFERENCES public.capsules(id) ON DELETE CASCADE,
    file_url TEXT NOT NULL,
    file_type TEXT NOT NULL CHECK (file_type IN ('image', 'video', 'audio', 'text')),
    caption TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS public.tags (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS public.capsule_item_tags (
    capsule_item_id UUID NOT NULL REFERENCES public.capsule_items(id) ON DELETE CASCADE,
    tag_id UUID NOT NULL REFERENCES public.tags(id) ON DELETE CASCADE,
    PRIMARY KEY (capsule_item_id, tag_id)
);

CREATE TABLE IF NOT EXISTS public.capsule_members (
    capsule_id UUID NOT NULL REFERENCES public.capsules(id) ON DELETE CASCADE,
    user_id UUID NOT NULL REFERENCES public.users(id) ON DELETE CASCADE,
    role TEXT NOT NULL DEFAULT 'viewer',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (capsule_id, user_id)
);

CREATE INDEX IF NOT EXISTS idx_capsules_owner_id ON public.capsules(owner_id);
CREATE INDEX IF NOT EXISTS idx_capsule_items_capsule_id ON public.capsule_items(capsule_id);

CREATE OR REPLACE FUNCTION public.handle_new_user() RETURNS TRIGGER
LANGUAGE plpgsql SECURITY DEFINER SET search_path = public AS $$
BEGIN
    INSERT INTO public.users (id, email, username, notify_on_release)
    VALUES (
        NEW.id,
        NEW.email,
        NEW.raw_user_meta_data ->> 'username',
        COALESCE((NEW.raw_user_meta_data ->> 'notify_on_release')::BOOLEAN, FALSE)
    );
    RETURN NEW;
END;
$$;

DROP TRIGGER IF EXISTS on_auth_user_created ON auth.users;
CREATE TRIGGER on_auth_user_created
    AFTER INSERT ON auth.users
    FOR EACH ROW EXECUTE FUNCTION public.handle_new_user();

ALTER TABLE public.users ENABLE ROW LEVEL SECURITY;
ALTER TABLE public.capsules ENABLE ROW LEVEL SECURITY;
ALTER TABLE public.capsule_items ENABLE ROW LEVEL SECURITY;
ALTER TABLE public.tags ENABLE ROW LEVEL SECURITY;
ALTER TABLE public.capsule_item_tags ENABLE ROW LEVEL SECURITY;
ALTER TABLE public.capsule_members ENABLE ROW LEVEL SECURITY;

CREATE POLICY users_self ON public.users
    FOR SELECT USING (auth.uid() = id);

CREATE POLICY capsules_owner_all ON public.capsules
    FOR ALL USING (auth.uid() = owner_id) WITH CHECK (auth.uid() = owner_id);

CREATE POLICY capsules_member_read ON public.capsules
    FOR SELECT USING (EXISTS (
        SELECT 1 FROM public.capsule_members m
        WHERE m.capsule_id = id AND m.user_id = auth.uid()
    ));

CREATE POLICY capsules_public_read ON public.capsules
    FOR SELECT USING (is_released AND is_public_on_release);

CREATE POLICY items_owner_all ON public.capsule_items
    FOR ALL USING (EXISTS (
        SELECT 1 FROM public.capsules c
        WHERE c.id = capsule_id AND c.owner_id = auth.uid()
    )) WITH CHECK (EXISTS (
        SELECT 1 FROM public.capsules c
        WHERE c.id = capsule_id AND c.owner_id = auth.uid()
    ));

CREATE POLICY items_released_read ON public.capsule_items
    FOR SELECT USING (EXISTS (
        SELECT 1 FROM public.capsules c
        WHERE c.id = capsule_id AND c.is_released AND c.is_public_on_release
    ));

CREATE POLICY tags_read ON public.tags FOR SELECT USING (TRUE);
CREATE POLICY tags_insert ON public.tags FOR INSERT TO authenticated WITH CHECK (TRUE);
CREATE POLICY tags_update ON public.tags FOR UPDATE TO authenticated USING (TRUE);

CREATE POLICY item_tags_read ON public.capsule_item_tags FOR SELECT USING (TRUE);
CREATE POLICY item_tags_owner_insert ON public.capsule_item_tags
    FOR INSERT WITH CHECK (EXISTS (
        SELECT 1 FROM public.capsule_items i
        JOIN public.capsules c ON c.id = i.capsule_id
        WHERE i.id = capsule_item_id AND c.owner_id = auth.uid()
    ));

CREATE POLICY members_owner_all ON public.capsule_members
    FOR ALL USING (EXISTS (
        SELECT 1 FROM public.capsules c
        WHERE c.id = capsule_id AND c.owner_id = auth.uid()
    ));

CREATE POLICY members_self_read ON public.capsule_members
    FOR SELECT USING (auth.uid() = user_id);

INSERT INTO storage.buckets (id, name, public)
VALUES ('capsule-media', 'capsule-media', TRUE)
ON CONFLICT (id) DO NOTHING;

CREATE POLICY media_authenticated_upload ON storage.objects
    FOR INSERT TO authenticated WITH CHECK (bucket_id = 'capsule-media');
"#;
